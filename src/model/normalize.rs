//! Deterministic re-indexing of a report.
//!
//! Two reports describing identical measurements can assign different
//! numeric ids when their producers traversed the data in different orders.
//! Normalization re-derives every id by visiting the tree sorted by stable
//! identifier strings - files by path, nodes by scope identifier, references
//! by target identity, modules by module identity - and re-inserting into a
//! fresh index in that order. Equal measurements then serialize to
//! byte-identical buffers, which is what diffing and caching key on.

use std::collections::BTreeMap;

use log::debug;

use super::project_report::{InternalIdCounter, ProjectReport};
use super::report::{ModuleReport, Report};
use super::source_file::SourceFileRecord;
use super::source_node::{ReferenceKind, SourceNodeRecord};
use crate::index::{GlobalIndex, PathId};
use crate::utils::error::IndexError;

/// Rebuild a report against a fresh index in canonical order.
///
/// Version, kind, relative root dir and headless values are preserved;
/// only the id assignment changes.
pub fn normalize_project_report(
    input: &ProjectReport,
    counter: &mut InternalIdCounter,
) -> Result<ProjectReport, IndexError> {
    debug!(
        "Normalizing report with {} source node records",
        input.report.source_node_record_count()
    );

    let mut output = ProjectReport::with_version(input.report_version(), input.kind(), counter);
    normalize_body(
        &input.report,
        &input.global_index,
        &mut output.report,
        &mut output.global_index,
    )?;
    Ok(output)
}

/// Fixed collection order: intern, then lang-internal, then extern
fn normalize_body(
    src: &Report,
    src_index: &GlobalIndex,
    dst: &mut Report,
    dst_index: &mut GlobalIndex,
) -> Result<(), IndexError> {
    dst.relative_root_dir = src.relative_root_dir.clone();
    dst.headless_sensor_values = src.headless_sensor_values.clone();

    for file in sorted_by_path(&src.intern, src_index)? {
        let dst_path = src_index.insert_path_into(file.path_id, dst_index)?;
        let mut dst_file = SourceFileRecord::new(dst_path);
        normalize_file(file, src_index, &mut dst_file, dst_index)?;
        dst.intern.insert(dst_path, dst_file);
    }

    for file in sorted_by_path(&src.lang_internal, src_index)? {
        let dst_path = src_index.insert_path_into(file.path_id, dst_index)?;
        let mut dst_file = SourceFileRecord::new(dst_path);
        normalize_file(file, src_index, &mut dst_file, dst_index)?;
        dst.lang_internal.insert(dst_path, dst_file);
    }

    let mut modules: Vec<&ModuleReport> = src.extern_modules.values().collect();
    modules.sort_by_key(|module_report| module_report.identity.identifier());
    for module_report in modules {
        let dst_module_id = dst_index.ensure_module(&module_report.identity);
        let mut dst_module = ModuleReport::new(
            dst_module_id,
            module_report.identity.clone(),
            dst.report_version,
            dst.kind,
        );
        normalize_body(&module_report.body, src_index, &mut dst_module.body, dst_index)?;
        dst.extern_modules.insert(dst_module_id, dst_module);
    }

    Ok(())
}

fn sorted_by_path<'a>(
    files: &'a BTreeMap<PathId, SourceFileRecord>,
    index: &GlobalIndex,
) -> Result<Vec<&'a SourceFileRecord>, IndexError> {
    let mut keyed = Vec::with_capacity(files.len());
    for file in files.values() {
        let path = index
            .path_by_id(file.path_id)
            .ok_or(IndexError::UnknownPathId(file.path_id))?;
        keyed.push((path.path.clone(), file));
    }
    keyed.sort_by(|a, b| a.0.cmp(&b.0));
    Ok(keyed.into_iter().map(|(_, file)| file).collect())
}

fn normalize_file(
    src_file: &SourceFileRecord,
    src_index: &GlobalIndex,
    dst_file: &mut SourceFileRecord,
    dst_index: &mut GlobalIndex,
) -> Result<(), IndexError> {
    let mut keyed = Vec::with_capacity(src_file.source_nodes.len());
    for record in src_file.source_nodes.values() {
        let node = src_index
            .source_node_by_id(record.id)
            .ok_or(IndexError::UnknownSourceNodeId(record.id))?;
        keyed.push((node.identifier.clone(), record));
    }
    keyed.sort_by(|a, b| a.0.cmp(&b.0));

    for (_, record) in keyed {
        let dst_id = src_index.insert_source_node_into(record.id, dst_index)?;
        let mut dst_record = record.empty_of_same_kind(dst_id);
        dst_record.sensor_values = record.sensor_values.clone();

        // same kind, so the fresh record carries maps whenever the source does
        if let (Some(src_maps), Some(dst_maps)) =
            (record.references(), dst_record.references_mut())
        {
            for kind in [
                ReferenceKind::Intern,
                ReferenceKind::Extern,
                ReferenceKind::LangInternal,
            ] {
                let mut references = Vec::with_capacity(src_maps.bucket(kind).len());
                for (target_id, reference) in src_maps.bucket(kind) {
                    let identity = src_index.source_node_identity(*target_id)?;
                    references.push((identity.global_identifier(), *target_id, reference));
                }
                references.sort_by(|a, b| a.0.cmp(&b.0));

                for (_, target_id, reference) in references {
                    let dst_target = src_index.insert_source_node_into(target_id, dst_index)?;
                    let mut dst_reference: SourceNodeRecord = reference.clone();
                    dst_reference.id = dst_target;
                    dst_maps.bucket_mut(kind).insert(dst_target, dst_reference);
                }
            }
        }

        dst_file.source_nodes.insert(dst_id, dst_record);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::identifier::SourceNodeIdentity;
    use crate::model::report::ReportKind;
    use crate::model::sensor_values::SensorValues;

    fn delta(time: u64) -> SensorValues {
        SensorValues {
            profiler_hits: 1,
            self_cpu_time: time,
            ..SensorValues::zero()
        }
    }

    #[test]
    fn test_normalization_preserves_content_and_reorders_ids() {
        let mut counter = InternalIdCounter::new();
        let mut project = ProjectReport::new(ReportKind::Measurement, &mut counter);

        // insert in reverse lexicographic order
        project
            .add_sample(&SourceNodeIdentity::own_code("./src/b.ts", "{root}"), &delta(2))
            .unwrap();
        project
            .add_sample(&SourceNodeIdentity::own_code("./src/a.ts", "{root}"), &delta(1))
            .unwrap();

        let normalized = normalize_project_report(&project, &mut counter).unwrap();
        assert_eq!(normalized.kind(), ReportKind::Measurement);
        assert_eq!(normalized.report.source_node_record_count(), 2);

        // a.ts now precedes b.ts in id order
        let own_module = normalized.global_index.modules().next().unwrap();
        let first_path = normalized.global_index.path_by_id(0).unwrap();
        assert_eq!(own_module.identity.identifier(), "{self}");
        assert_eq!(first_path.path, "./src/a.ts");
    }
}
