//! Source-file records: one measured file and its node records.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::sensor_values::SensorValues;
use super::source_node::{ReferenceKind, SourceNodeRecord};
use crate::codec::{BufferReader, BufferWriter};
use crate::index::{GlobalIndex, PathId, SourceNodeId};
use crate::utils::error::{CodecError, IndexError};

/// All measurements of one source file, keyed by source-node id
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceFileRecord {
    /// Path id in the session's global index
    pub path_id: PathId,

    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub source_nodes: BTreeMap<SourceNodeId, SourceNodeRecord>,
}

/// File-level rollup produced by [`SourceFileRecord::total_source_node_meta_data`]:
/// the summed sensor values of the file plus, per reference bucket, how much
/// flowed into which other file
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SourceFileTotals {
    /// Field-wise sum over the file's node records. References the file
    /// makes to itself are deducted from the aggregated fields, since their
    /// flow is already counted by the target node's own record.
    pub total: SensorValues,

    /// Summed values flowing into same-codebase files, by target path id
    pub intern_per_file: BTreeMap<PathId, SensorValues>,

    /// Summed values flowing into third-party files, by target path id
    pub extern_per_file: BTreeMap<PathId, SensorValues>,

    /// Summed values flowing into runtime-internal files, by target path id
    pub lang_internal_per_file: BTreeMap<PathId, SensorValues>,
}

impl SourceFileRecord {
    pub fn new(path_id: PathId) -> Self {
        Self {
            path_id,
            source_nodes: BTreeMap::new(),
        }
    }

    /// Create-or-get the record for a node id
    pub fn ensure_source_node(
        &mut self,
        id: SourceNodeId,
        make: impl FnOnce(SourceNodeId) -> SourceNodeRecord,
    ) -> &mut SourceNodeRecord {
        self.source_nodes.entry(id).or_insert_with(|| make(id))
    }

    /// Number of node records in this file
    pub fn source_node_count(&self) -> usize {
        self.source_nodes.len()
    }

    /// Compute the file-level rollup.
    ///
    /// # Errors
    /// * `IndexError::UnknownSourceNodeId` - a reference targets an id the
    ///   index never allocated; the report and its index are out of sync,
    ///   which is an internal-consistency bug in the producer
    pub fn total_source_node_meta_data(
        &self,
        index: &GlobalIndex,
    ) -> Result<SourceFileTotals, IndexError> {
        let mut totals = SourceFileTotals::default();

        for record in self.source_nodes.values() {
            totals.total.add(&record.sensor_values);

            let Some(maps) = record.references() else {
                continue;
            };
            for (kind, target_id, reference) in maps.iter_all() {
                let location = index
                    .source_node_location(target_id)
                    .ok_or(IndexError::UnknownSourceNodeId(target_id))?;

                let per_file = match kind {
                    ReferenceKind::Intern => &mut totals.intern_per_file,
                    ReferenceKind::Extern => &mut totals.extern_per_file,
                    ReferenceKind::LangInternal => &mut totals.lang_internal_per_file,
                };
                per_file
                    .entry(location.path_id)
                    .or_insert_with(SensorValues::zero)
                    .add(&reference.sensor_values);

                if location.path_id == self.path_id {
                    totals.total.subtract_aggregated_of(&reference.sensor_values);
                }
            }
        }

        Ok(totals)
    }

    // --- binary codec ---

    pub fn to_buffer(&self, writer: &mut BufferWriter) -> Result<(), CodecError> {
        writer.write_u32(self.path_id);
        writer.write_map(
            &self.source_nodes,
            |w, id| {
                w.write_u32(*id);
                Ok(())
            },
            |w, record| record.to_buffer(w),
        )
    }

    pub fn from_buffer(reader: &mut BufferReader<'_>) -> Result<Self, CodecError> {
        let path_id = reader.read_u32("source file path id")?;
        let source_nodes = reader.read_map(
            "source file nodes",
            |r| r.read_u32("source node id"),
            SourceNodeRecord::from_buffer,
        )?;
        Ok(Self {
            path_id,
            source_nodes,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::identifier::ModuleIdentity;
    use crate::model::source_node::ReferenceKind;

    fn delta(time: u64) -> SensorValues {
        SensorValues {
            profiler_hits: 1,
            self_cpu_time: time,
            ..SensorValues::zero()
        }
    }

    /// Two files in the own-code module, one function each, plus one
    /// function calling into the other file and into itself
    fn build_fixture() -> (GlobalIndex, SourceFileRecord) {
        let mut index = GlobalIndex::new();
        let own = index.ensure_module(&ModuleIdentity::own_code());
        let here = index.ensure_path(own, "./src/a.ts").unwrap();
        let there = index.ensure_path(own, "./src/b.ts").unwrap();

        let caller = index.ensure_source_node(here, "{root}.{function:caller}").unwrap();
        let local = index.ensure_source_node(here, "{root}.{function:local}").unwrap();
        let remote = index.ensure_source_node(there, "{root}.{function:remote}").unwrap();

        let mut file = SourceFileRecord::new(here);
        let record = file.ensure_source_node(caller, SourceNodeRecord::source_node);
        record.add_sample(&delta(100));
        record.add_reference(ReferenceKind::Intern, local, &delta(30)).unwrap();
        record.add_reference(ReferenceKind::Intern, remote, &delta(20)).unwrap();

        let local_record = file.ensure_source_node(local, SourceNodeRecord::source_node);
        local_record.add_sample(&delta(30));

        (index, file)
    }

    #[test]
    fn test_totals_deduct_self_file_references() {
        let (index, file) = build_fixture();
        let totals = file.total_source_node_meta_data(&index).unwrap();

        // caller: self 100, aggregated 150; local: self 30, aggregated 30.
        // the in-file reference to `local` (30) is deducted from aggregated.
        assert_eq!(totals.total.self_cpu_time, 130);
        assert_eq!(totals.total.aggregated_cpu_time, 150);
        assert_eq!(totals.total.profiler_hits, 2);
    }

    #[test]
    fn test_totals_group_flow_by_target_file() {
        let (index, file) = build_fixture();
        let totals = file.total_source_node_meta_data(&index).unwrap();

        assert_eq!(totals.intern_per_file.len(), 2);
        let to_here = &totals.intern_per_file[&file.path_id];
        assert_eq!(to_here.aggregated_cpu_time, 30);
        let there = index.lookup_path(0, "./src/b.ts").unwrap();
        let to_there = &totals.intern_per_file[&there];
        assert_eq!(to_there.aggregated_cpu_time, 20);
        assert!(totals.extern_per_file.is_empty());
    }

    #[test]
    fn test_totals_require_known_reference_targets() {
        let (_, file) = build_fixture();
        // a fresh index knows nothing about the ids used in the file
        let foreign = GlobalIndex::new();
        assert!(file.total_source_node_meta_data(&foreign).is_err());
    }

    #[test]
    fn test_codec_round_trip() {
        let (_, file) = build_fixture();
        let mut writer = BufferWriter::new();
        file.to_buffer(&mut writer).unwrap();
        let bytes = writer.into_bytes();

        let mut reader = BufferReader::new(&bytes);
        let decoded = SourceFileRecord::from_buffer(&mut reader).unwrap();
        assert!(reader.is_exhausted());
        assert_eq!(decoded, file);
    }
}
