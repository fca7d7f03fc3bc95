//! The report tree: measurements of one codebase, split into own code,
//! runtime internals and third-party modules.
//!
//! A `Report` body carries three child collections: `intern` (own source
//! files), `lang_internal` (runtime-internal files) and `extern_modules`
//! (one nested `ModuleReport` per third-party dependency). Module reports
//! recurse - a dependency's report has the same shape as the root's.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::identifier::{ModuleIdentity, SourceNodeIdentity};
use super::sensor_values::SensorValues;
use super::source_file::SourceFileRecord;
use super::source_node::{ReferenceKind, SourceNodeRecord};
use super::version::ReportVersion;
use crate::codec::{BufferReader, BufferWriter};
use crate::index::{GlobalIndex, ModuleId, PathId, SourceNodeId};
use crate::utils::config::{HEADLESS_SENSOR_VALUES_SINCE, LEGACY_INTERN_MAPPING_UNTIL};
use crate::utils::error::{CodecError, IndexError, ReportError, ValidationError};

const REPORT_TYPE_ROOT: u8 = 0;
const REPORT_TYPE_MODULE: u8 = 1;

/// Whether a report holds one measurement run or an accumulation of runs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReportKind {
    Measurement,
    Accumulated,
}

impl ReportKind {
    pub fn kind_tag(&self) -> u8 {
        match self {
            ReportKind::Measurement => 0,
            ReportKind::Accumulated => 1,
        }
    }

    pub fn from_tag(tag: u8) -> Result<Self, CodecError> {
        match tag {
            0 => Ok(ReportKind::Measurement),
            1 => Ok(ReportKind::Accumulated),
            other => Err(CodecError::InvalidReportKind(other)),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ReportKind::Measurement => "measurement",
            ReportKind::Accumulated => "accumulated",
        }
    }
}

/// Measurement tree of one codebase (or of one module inside it)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Report {
    pub report_version: ReportVersion,

    pub kind: ReportKind,

    /// Path from the report file's location to the execution root, used to
    /// re-anchor relative paths on load
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub relative_root_dir: Option<String>,

    /// Energy/time attributed to work with no resolvable call frame
    #[serde(default, skip_serializing_if = "SensorValues::is_zero")]
    pub headless_sensor_values: SensorValues,

    /// Own source files, by path id
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub intern: BTreeMap<PathId, SourceFileRecord>,

    /// Runtime-internal files, by path id
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub lang_internal: BTreeMap<PathId, SourceFileRecord>,

    /// Third-party modules, by module id
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub extern_modules: BTreeMap<ModuleId, ModuleReport>,
}

/// A report plus the module identity it belongs to
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModuleReport {
    /// Module id in the root report's global index
    pub module_id: ModuleId,

    pub identity: ModuleIdentity,

    #[serde(flatten)]
    pub body: Report,
}

impl ModuleReport {
    pub fn new(
        module_id: ModuleId,
        identity: ModuleIdentity,
        report_version: ReportVersion,
        kind: ReportKind,
    ) -> Self {
        Self {
            module_id,
            identity,
            body: Report::new(report_version, kind),
        }
    }
}

impl Report {
    pub fn new(report_version: ReportVersion, kind: ReportKind) -> Self {
        Self {
            report_version,
            kind,
            relative_root_dir: None,
            headless_sensor_values: SensorValues::zero(),
            intern: BTreeMap::new(),
            lang_internal: BTreeMap::new(),
            extern_modules: BTreeMap::new(),
        }
    }

    /// Record a sample for a stable identity, creating index entries and
    /// records lazily, and routing into the right child collection:
    /// own code, runtime internals, or the identity's module report.
    ///
    /// Returns the source-node id the sample was attributed to.
    pub fn add_sample(
        &mut self,
        index: &mut GlobalIndex,
        identity: &SourceNodeIdentity,
        delta: &SensorValues,
    ) -> Result<SourceNodeId, ReportError> {
        let module_id = index.ensure_module(&identity.module);
        let path_id = index.ensure_path(module_id, &identity.path)?;
        let node_id = index.ensure_source_node(path_id, &identity.identifier)?;

        if identity.module.is_own_code() {
            self.intern
                .entry(path_id)
                .or_insert_with(|| SourceFileRecord::new(path_id))
                .ensure_source_node(node_id, SourceNodeRecord::source_node)
                .add_sample(delta);
        } else if identity.module.is_lang_internal() {
            self.lang_internal
                .entry(path_id)
                .or_insert_with(|| SourceFileRecord::new(path_id))
                .ensure_source_node(node_id, SourceNodeRecord::lang_internal_source_node)
                .add_sample(delta);
        } else {
            let report_version = self.report_version;
            let kind = self.kind;
            self.extern_modules
                .entry(module_id)
                .or_insert_with(|| {
                    ModuleReport::new(module_id, identity.module.clone(), report_version, kind)
                })
                .body
                .intern
                .entry(path_id)
                .or_insert_with(|| SourceFileRecord::new(path_id))
                .ensure_source_node(node_id, SourceNodeRecord::source_node)
                .add_sample(delta);
        }

        Ok(node_id)
    }

    /// Record that `caller_id`'s aggregated time/energy flowed into
    /// `target`. The target gets an index entry (but no record of its own),
    /// the caller gets a reference record in the bucket of `kind`, and the
    /// delta rolls up into the caller's bucket and aggregated totals.
    ///
    /// Returns the target's source-node id.
    pub fn add_reference(
        &mut self,
        index: &mut GlobalIndex,
        caller_id: SourceNodeId,
        kind: ReferenceKind,
        target: &SourceNodeIdentity,
        delta: &SensorValues,
    ) -> Result<SourceNodeId, ReportError> {
        let target_module = index.ensure_module(&target.module);
        let target_path = index.ensure_path(target_module, &target.path)?;
        let target_id = index.ensure_source_node(target_path, &target.identifier)?;

        let caller = self.find_record_mut(index, caller_id)?;
        caller.add_reference(kind, target_id, delta)?;
        Ok(target_id)
    }

    /// Locate the record for a node id somewhere in this report tree
    fn find_record_mut(
        &mut self,
        index: &GlobalIndex,
        id: SourceNodeId,
    ) -> Result<&mut SourceNodeRecord, ReportError> {
        let location = index
            .source_node_location(id)
            .ok_or(IndexError::UnknownSourceNodeId(id))?;
        let module = index
            .module_by_id(location.module_id)
            .ok_or(IndexError::UnknownModuleId(location.module_id))?;

        let collection = if module.identity.is_own_code() {
            &mut self.intern
        } else if module.identity.is_lang_internal() {
            &mut self.lang_internal
        } else {
            let module_report = self
                .find_module_report_mut(location.module_id)
                .ok_or(IndexError::UnknownModuleId(location.module_id))?;
            &mut module_report.body.intern
        };

        collection
            .get_mut(&location.path_id)
            .and_then(|file| file.source_nodes.get_mut(&id))
            .ok_or(ReportError::RecordNotFound { id })
    }

    /// The module report for a module id, searched recursively
    pub fn find_module_report(&self, module_id: ModuleId) -> Option<&ModuleReport> {
        if let Some(found) = self.extern_modules.get(&module_id) {
            return Some(found);
        }
        for module_report in self.extern_modules.values() {
            let found = module_report.body.find_module_report(module_id);
            if found.is_some() {
                return found;
            }
        }
        None
    }

    fn find_module_report_mut(&mut self, module_id: ModuleId) -> Option<&mut ModuleReport> {
        if self.extern_modules.contains_key(&module_id) {
            return self.extern_modules.get_mut(&module_id);
        }
        for module_report in self.extern_modules.values_mut() {
            let found = module_report.body.find_module_report_mut(module_id);
            if found.is_some() {
                return found;
            }
        }
        None
    }

    /// All source-file collections of this body (not of nested modules):
    /// intern first, then lang-internal
    pub fn own_files(&self) -> impl Iterator<Item = &SourceFileRecord> {
        self.intern.values().chain(self.lang_internal.values())
    }

    /// Number of source-node records in the whole tree
    pub fn source_node_record_count(&self) -> usize {
        let own: usize = self.own_files().map(|f| f.source_node_count()).sum();
        let nested: usize = self
            .extern_modules
            .values()
            .map(|m| m.body.source_node_record_count())
            .sum();
        own + nested
    }

    /// Check the aggregate invariants of every record in the tree.
    ///
    /// # Errors
    /// * `ValidationError` - a record's reference buckets do not sum to its
    ///   declared totals; the producer mis-attributed a sample
    pub fn validate(&self) -> Result<(), ValidationError> {
        self.headless_sensor_values.validate()?;
        for file in self.own_files() {
            for record in file.source_nodes.values() {
                record.validate()?;
            }
        }
        for module_report in self.extern_modules.values() {
            module_report.body.validate()?;
        }
        Ok(())
    }

    // --- binary codec ---

    /// Encode the report frame. Pass the module identity when this body is
    /// a module report; the frame is tagged so the reader knows which
    /// framing to expect.
    pub fn to_buffer(
        &self,
        writer: &mut BufferWriter,
        module_identity: Option<&ModuleIdentity>,
    ) -> Result<(), CodecError> {
        writer.write_string(&self.report_version.to_string())?;
        writer.write_u8(self.kind.kind_tag());

        match module_identity {
            None => writer.write_u8(REPORT_TYPE_ROOT),
            Some(identity) => {
                writer.write_u8(REPORT_TYPE_MODULE);
                writer.write_string(&identity.identifier())?;
            }
        }

        match &self.relative_root_dir {
            Some(dir) => {
                writer.write_bool(true);
                writer.write_string(dir)?;
            }
            None => writer.write_bool(false),
        }

        if self.report_version >= HEADLESS_SENSOR_VALUES_SINCE {
            self.headless_sensor_values.to_buffer(writer)?;
        }
        if self.report_version <= LEGACY_INTERN_MAPPING_UNTIL {
            // legacy intern-mapping table; nothing left that produces
            // entries, so old readers get an empty one
            writer.write_u32(0);
        }

        writer.write_map(
            &self.intern,
            |w, id| {
                w.write_u32(*id);
                Ok(())
            },
            |w, file| file.to_buffer(w),
        )?;
        writer.write_map(
            &self.lang_internal,
            |w, id| {
                w.write_u32(*id);
                Ok(())
            },
            |w, file| file.to_buffer(w),
        )?;
        writer.write_map(
            &self.extern_modules,
            |w, id| {
                w.write_u32(*id);
                Ok(())
            },
            |w, module_report| {
                module_report
                    .body
                    .to_buffer(w, Some(&module_report.identity))
            },
        )?;

        Ok(())
    }

    /// Decode a report frame, returning the module identity when the frame
    /// was tagged as a module report
    pub fn from_buffer(
        reader: &mut BufferReader<'_>,
    ) -> Result<(Self, Option<ModuleIdentity>), CodecError> {
        let report_version: ReportVersion = reader.read_string("report version")?.parse()?;
        let kind = ReportKind::from_tag(reader.read_u8("report kind")?)?;

        let type_tag = reader.read_u8("report type")?;
        let module_identity = match type_tag {
            REPORT_TYPE_ROOT => None,
            REPORT_TYPE_MODULE => {
                let identifier = reader.read_string("module identifier")?;
                Some(ModuleIdentity::from_identifier(&identifier))
            }
            other => return Err(CodecError::InvalidReportType(other)),
        };

        let relative_root_dir = if reader.read_bool("relative root dir flag")? {
            Some(reader.read_string("relative root dir")?)
        } else {
            None
        };

        let headless_sensor_values = if report_version >= HEADLESS_SENSOR_VALUES_SINCE {
            SensorValues::from_buffer(reader)?
        } else {
            SensorValues::zero()
        };

        if report_version <= LEGACY_INTERN_MAPPING_UNTIL {
            // decode and discard; the table's semantics are not interpreted
            let _legacy = reader.read_map(
                "legacy intern mapping",
                |r| r.read_u32("legacy source id"),
                |r| r.read_u32("legacy target id"),
            )?;
        }

        let intern = reader.read_map(
            "intern files",
            |r| r.read_u32("path id"),
            SourceFileRecord::from_buffer,
        )?;
        let lang_internal = reader.read_map(
            "lang internal files",
            |r| r.read_u32("path id"),
            SourceFileRecord::from_buffer,
        )?;

        let module_count = reader.read_u32("extern module count")?;
        let mut extern_modules = BTreeMap::new();
        for _ in 0..module_count {
            let module_id = reader.read_u32("extern module id")?;
            let (body, identity) = Report::from_buffer(reader)?;
            let identity = identity.ok_or(CodecError::InvalidReportType(REPORT_TYPE_ROOT))?;
            extern_modules.insert(
                module_id,
                ModuleReport {
                    module_id,
                    identity,
                    body,
                },
            );
        }

        Ok((
            Self {
                report_version,
                kind,
                relative_root_dir,
                headless_sensor_values,
                intern,
                lang_internal,
                extern_modules,
            },
            module_identity,
        ))
    }
}
