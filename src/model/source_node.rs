//! Source-node records: the measured scopes and their outgoing references.
//!
//! A record's kind decides whether it can carry references: the three node
//! kinds (Aggregate, SourceNode, LangInternalSourceNode) own three reference
//! buckets recording where their aggregated time/energy flowed - into the
//! same codebase (intern), a third-party module (extern) or the language
//! runtime (lang-internal). Reference records themselves are leaves: each is
//! an independent accumulation for one (caller, callee) edge, so the whole
//! structure is a call-attribution graph flattened onto the caller.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::sensor_values::SensorValues;
use crate::codec::{BufferReader, BufferWriter};
use crate::index::SourceNodeId;
use crate::utils::config::ENERGY_EPSILON;
use crate::utils::error::{CodecError, ReportError, ValidationError};

/// Which bucket an outgoing reference belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReferenceKind {
    Intern,
    Extern,
    LangInternal,
}

/// The three reference buckets of a node record, keyed by the target's
/// source-node id in the session's global index
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ReferenceMaps {
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub intern: BTreeMap<SourceNodeId, SourceNodeRecord>,

    #[serde(rename = "extern", skip_serializing_if = "BTreeMap::is_empty")]
    pub extern_refs: BTreeMap<SourceNodeId, SourceNodeRecord>,

    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub lang_internal: BTreeMap<SourceNodeId, SourceNodeRecord>,
}

impl ReferenceMaps {
    pub fn is_empty(&self) -> bool {
        self.intern.is_empty() && self.extern_refs.is_empty() && self.lang_internal.is_empty()
    }

    pub fn bucket(&self, kind: ReferenceKind) -> &BTreeMap<SourceNodeId, SourceNodeRecord> {
        match kind {
            ReferenceKind::Intern => &self.intern,
            ReferenceKind::Extern => &self.extern_refs,
            ReferenceKind::LangInternal => &self.lang_internal,
        }
    }

    pub fn bucket_mut(
        &mut self,
        kind: ReferenceKind,
    ) -> &mut BTreeMap<SourceNodeId, SourceNodeRecord> {
        match kind {
            ReferenceKind::Intern => &mut self.intern,
            ReferenceKind::Extern => &mut self.extern_refs,
            ReferenceKind::LangInternal => &mut self.lang_internal,
        }
    }

    /// All references across the three buckets, tagged with their kind
    pub fn iter_all(&self) -> impl Iterator<Item = (ReferenceKind, SourceNodeId, &SourceNodeRecord)> {
        let intern = self
            .intern
            .iter()
            .map(|(id, r)| (ReferenceKind::Intern, *id, r));
        let extern_refs = self
            .extern_refs
            .iter()
            .map(|(id, r)| (ReferenceKind::Extern, *id, r));
        let lang_internal = self
            .lang_internal
            .iter()
            .map(|(id, r)| (ReferenceKind::LangInternal, *id, r));
        intern.chain(extern_refs).chain(lang_internal)
    }
}

/// Kind-dependent payload of a record.
///
/// Only the three node kinds carry reference maps; the three reference
/// kinds are leaves. Modeled as a sum type so a record that cannot carry
/// references does not even have the maps.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "references")]
pub enum RecordBody {
    Aggregate(ReferenceMaps),
    SourceNode(ReferenceMaps),
    LangInternalSourceNode(ReferenceMaps),
    InternRef,
    ExternRef,
    LangInternalRef,
}

impl RecordBody {
    /// Wire tag of this kind
    pub fn kind_tag(&self) -> u8 {
        match self {
            RecordBody::Aggregate(_) => 0,
            RecordBody::SourceNode(_) => 1,
            RecordBody::LangInternalSourceNode(_) => 2,
            RecordBody::InternRef => 3,
            RecordBody::ExternRef => 4,
            RecordBody::LangInternalRef => 5,
        }
    }

    pub fn kind_name(&self) -> &'static str {
        match self {
            RecordBody::Aggregate(_) => "Aggregate",
            RecordBody::SourceNode(_) => "SourceNode",
            RecordBody::LangInternalSourceNode(_) => "LangInternalSourceNode",
            RecordBody::InternRef => "InternRef",
            RecordBody::ExternRef => "ExternRef",
            RecordBody::LangInternalRef => "LangInternalRef",
        }
    }
}

/// One measured scope (or one outgoing reference of a scope)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceNodeRecord {
    /// Id in the session's global index
    pub id: SourceNodeId,

    pub sensor_values: SensorValues,

    #[serde(flatten)]
    pub body: RecordBody,
}

impl SourceNodeRecord {
    /// A node of the profiled project's own code
    pub fn source_node(id: SourceNodeId) -> Self {
        Self {
            id,
            sensor_values: SensorValues::zero(),
            body: RecordBody::SourceNode(ReferenceMaps::default()),
        }
    }

    /// A node inside the language runtime
    pub fn lang_internal_source_node(id: SourceNodeId) -> Self {
        Self {
            id,
            sensor_values: SensorValues::zero(),
            body: RecordBody::LangInternalSourceNode(ReferenceMaps::default()),
        }
    }

    /// A synthetic aggregate node
    pub fn aggregate(id: SourceNodeId) -> Self {
        Self {
            id,
            sensor_values: SensorValues::zero(),
            body: RecordBody::Aggregate(ReferenceMaps::default()),
        }
    }

    /// A reference leaf of the given bucket kind
    pub fn reference(id: SourceNodeId, kind: ReferenceKind) -> Self {
        let body = match kind {
            ReferenceKind::Intern => RecordBody::InternRef,
            ReferenceKind::Extern => RecordBody::ExternRef,
            ReferenceKind::LangInternal => RecordBody::LangInternalRef,
        };
        Self {
            id,
            sensor_values: SensorValues::zero(),
            body,
        }
    }

    /// An empty record of the same kind under a different id. Used when
    /// re-homing records into another index (merge, normalization).
    pub fn empty_of_same_kind(&self, id: SourceNodeId) -> Self {
        let body = match &self.body {
            RecordBody::Aggregate(_) => RecordBody::Aggregate(ReferenceMaps::default()),
            RecordBody::SourceNode(_) => RecordBody::SourceNode(ReferenceMaps::default()),
            RecordBody::LangInternalSourceNode(_) => {
                RecordBody::LangInternalSourceNode(ReferenceMaps::default())
            }
            RecordBody::InternRef => RecordBody::InternRef,
            RecordBody::ExternRef => RecordBody::ExternRef,
            RecordBody::LangInternalRef => RecordBody::LangInternalRef,
        };
        Self {
            id,
            sensor_values: SensorValues::zero(),
            body,
        }
    }

    /// The reference maps, if this record's kind permits children
    pub fn references(&self) -> Option<&ReferenceMaps> {
        match &self.body {
            RecordBody::Aggregate(maps)
            | RecordBody::SourceNode(maps)
            | RecordBody::LangInternalSourceNode(maps) => Some(maps),
            _ => None,
        }
    }

    pub fn references_mut(&mut self) -> Option<&mut ReferenceMaps> {
        match &mut self.body {
            RecordBody::Aggregate(maps)
            | RecordBody::SourceNode(maps)
            | RecordBody::LangInternalSourceNode(maps) => Some(maps),
            _ => None,
        }
    }

    /// Record a measured sample on this scope
    pub fn add_sample(&mut self, delta: &SensorValues) {
        self.sensor_values.add_own_sample(delta);
    }

    /// Create or get the reference record for `target_id` in the bucket of
    /// `kind`, add `delta` to it, and roll the delta up into this record's
    /// bucket and aggregated totals.
    ///
    /// # Errors
    /// * `ReportError::KindCannotCarryReferences` - this record is itself a
    ///   reference leaf
    pub fn add_reference(
        &mut self,
        kind: ReferenceKind,
        target_id: SourceNodeId,
        delta: &SensorValues,
    ) -> Result<(), ReportError> {
        let id = self.id;
        let kind_name = self.body.kind_name();
        let maps = self
            .references_mut()
            .ok_or(ReportError::KindCannotCarryReferences { id, kind: kind_name })?;

        let reference = maps
            .bucket_mut(kind)
            .entry(target_id)
            .or_insert_with(|| SourceNodeRecord::reference(target_id, kind));
        reference.sensor_values.add_own_sample(delta);

        match kind {
            ReferenceKind::Intern => self.sensor_values.add_intern_call(delta),
            ReferenceKind::Extern => self.sensor_values.add_extern_call(delta),
            ReferenceKind::LangInternal => self.sensor_values.add_lang_internal_call(delta),
        }
        Ok(())
    }

    /// Check the aggregate invariants of this record.
    ///
    /// For every node kind: each bucket's references must sum (over their
    /// aggregated fields) to exactly the node's declared bucket total, and
    /// the references overall must not exceed `aggregated - self`. Time and
    /// hit comparisons are exact; energy uses a small absolute epsilon to
    /// tolerate summation-order differences.
    pub fn validate(&self) -> Result<(), ValidationError> {
        self.sensor_values.validate()?;

        let Some(maps) = self.references() else {
            return Ok(());
        };

        for (_, _, reference) in maps.iter_all() {
            reference.sensor_values.validate()?;
        }

        self.validate_bucket(maps, ReferenceKind::Intern)?;
        self.validate_bucket(maps, ReferenceKind::Extern)?;
        self.validate_bucket(maps, ReferenceKind::LangInternal)?;

        let all: Vec<&SensorValues> = maps.iter_all().map(|(_, _, r)| &r.sensor_values).collect();
        let reference_total = SensorValues::sum(all.iter().copied());

        let own = &self.sensor_values;
        let time_budget = own
            .aggregated_cpu_time
            .checked_sub(own.self_cpu_time)
            .ok_or_else(|| ValidationError::AggregatedBudgetExceeded {
                id: self.id,
                reference_total: format!("{}us", reference_total.aggregated_cpu_time),
                budget: "aggregated < self".to_string(),
            })?;
        if reference_total.aggregated_cpu_time > time_budget {
            return Err(ValidationError::AggregatedBudgetExceeded {
                id: self.id,
                reference_total: format!("{}us", reference_total.aggregated_cpu_time),
                budget: format!("{time_budget}us"),
            });
        }

        let cpu_energy_budget =
            own.aggregated_cpu_energy_consumption - own.self_cpu_energy_consumption;
        if reference_total.aggregated_cpu_energy_consumption > cpu_energy_budget + ENERGY_EPSILON {
            return Err(ValidationError::AggregatedBudgetExceeded {
                id: self.id,
                reference_total: format!(
                    "{}mJ",
                    reference_total.aggregated_cpu_energy_consumption
                ),
                budget: format!("{cpu_energy_budget}mJ"),
            });
        }

        let ram_energy_budget =
            own.aggregated_ram_energy_consumption - own.self_ram_energy_consumption;
        if reference_total.aggregated_ram_energy_consumption > ram_energy_budget + ENERGY_EPSILON {
            return Err(ValidationError::AggregatedBudgetExceeded {
                id: self.id,
                reference_total: format!(
                    "{}mJ",
                    reference_total.aggregated_ram_energy_consumption
                ),
                budget: format!("{ram_energy_budget}mJ"),
            });
        }

        Ok(())
    }

    fn validate_bucket(
        &self,
        maps: &ReferenceMaps,
        kind: ReferenceKind,
    ) -> Result<(), ValidationError> {
        let bucket_sum =
            SensorValues::sum(maps.bucket(kind).values().map(|r| &r.sensor_values));
        let own = &self.sensor_values;

        let (bucket_name, declared_time, declared_cpu_energy, declared_ram_energy) = match kind {
            ReferenceKind::Intern => (
                "intern",
                own.intern_cpu_time,
                own.intern_cpu_energy_consumption,
                own.intern_ram_energy_consumption,
            ),
            ReferenceKind::Extern => (
                "extern",
                own.extern_cpu_time,
                own.extern_cpu_energy_consumption,
                own.extern_ram_energy_consumption,
            ),
            ReferenceKind::LangInternal => (
                "langInternal",
                own.lang_internal_cpu_time,
                own.lang_internal_cpu_energy_consumption,
                own.lang_internal_ram_energy_consumption,
            ),
        };

        if bucket_sum.aggregated_cpu_time != declared_time {
            return Err(ValidationError::BucketSumMismatch {
                id: self.id,
                bucket: bucket_name,
                declared: format!("{declared_time}us"),
                actual: format!("{}us", bucket_sum.aggregated_cpu_time),
            });
        }
        if (bucket_sum.aggregated_cpu_energy_consumption - declared_cpu_energy).abs()
            > ENERGY_EPSILON
        {
            return Err(ValidationError::BucketSumMismatch {
                id: self.id,
                bucket: bucket_name,
                declared: format!("{declared_cpu_energy}mJ cpu"),
                actual: format!("{}mJ cpu", bucket_sum.aggregated_cpu_energy_consumption),
            });
        }
        if (bucket_sum.aggregated_ram_energy_consumption - declared_ram_energy).abs()
            > ENERGY_EPSILON
        {
            return Err(ValidationError::BucketSumMismatch {
                id: self.id,
                bucket: bucket_name,
                declared: format!("{declared_ram_energy}mJ ram"),
                actual: format!("{}mJ ram", bucket_sum.aggregated_ram_energy_consumption),
            });
        }

        Ok(())
    }

    // --- binary codec ---

    /// Encode as id, kind tag, sensor values and (node kinds only) the
    /// three reference buckets
    pub fn to_buffer(&self, writer: &mut BufferWriter) -> Result<(), CodecError> {
        writer.write_u32(self.id);
        writer.write_u8(self.body.kind_tag());
        self.sensor_values.to_buffer(writer)?;

        if let Some(maps) = self.references() {
            for kind in [
                ReferenceKind::Intern,
                ReferenceKind::Extern,
                ReferenceKind::LangInternal,
            ] {
                writer.write_map(
                    maps.bucket(kind),
                    |w, id| {
                        w.write_u32(*id);
                        Ok(())
                    },
                    |w, record| record.to_buffer(w),
                )?;
            }
        }

        Ok(())
    }

    /// Decode a record encoded by [`Self::to_buffer`]
    pub fn from_buffer(reader: &mut BufferReader<'_>) -> Result<Self, CodecError> {
        let id = reader.read_u32("source node id")?;
        let tag = reader.read_u8("source node kind tag")?;
        let sensor_values = SensorValues::from_buffer(reader)?;

        let body = match tag {
            0 | 1 | 2 => {
                let intern = Self::read_bucket(reader)?;
                let extern_refs = Self::read_bucket(reader)?;
                let lang_internal = Self::read_bucket(reader)?;
                let maps = ReferenceMaps {
                    intern,
                    extern_refs,
                    lang_internal,
                };
                match tag {
                    0 => RecordBody::Aggregate(maps),
                    1 => RecordBody::SourceNode(maps),
                    _ => RecordBody::LangInternalSourceNode(maps),
                }
            }
            3 => RecordBody::InternRef,
            4 => RecordBody::ExternRef,
            5 => RecordBody::LangInternalRef,
            other => return Err(CodecError::InvalidNodeKind(other)),
        };

        Ok(Self {
            id,
            sensor_values,
            body,
        })
    }

    fn read_bucket(
        reader: &mut BufferReader<'_>,
    ) -> Result<BTreeMap<SourceNodeId, SourceNodeRecord>, CodecError> {
        reader.read_map(
            "reference bucket",
            |r| r.read_u32("reference target id"),
            SourceNodeRecord::from_buffer,
        )
    }
}
