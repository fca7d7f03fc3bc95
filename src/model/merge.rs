//! Merging measurement runs into one accumulated report.
//!
//! Numeric ids are per-run and non-portable, so matching happens exclusively
//! on the stable identifier strings rebuilt through each input's own index.
//! Every matched group is summed field-wise and re-homed under a fresh id in
//! the output's index. Preconditions (at least one input, one shared report
//! version, one module identity for module-report merges) are checked before
//! any mutation occurs.

use log::debug;

use super::project_report::{InternalIdCounter, ProjectReport};
use super::report::{ModuleReport, Report, ReportKind};
use super::source_file::SourceFileRecord;
use super::source_node::SourceNodeRecord;
use crate::index::GlobalIndex;
use crate::utils::error::MergeError;

/// Merge N measurement (or accumulated) reports of the same codebase.
///
/// The output kind is always `Accumulated`; its `headless_sensor_values`
/// are the field-wise sum of every input's. Merging is commutative and
/// associative over sets of reports.
///
/// # Errors
/// * `MergeError::NothingToMerge` - called with zero inputs
/// * `MergeError::ReportVersionMismatch` - inputs disagree on their version
pub fn merge_project_reports(
    inputs: &[&ProjectReport],
    counter: &mut InternalIdCounter,
) -> Result<ProjectReport, MergeError> {
    let Some(first) = inputs.first() else {
        return Err(MergeError::NothingToMerge);
    };

    let expected = first.report_version();
    for input in inputs {
        if input.report_version() != expected {
            return Err(MergeError::ReportVersionMismatch {
                expected: expected.to_string(),
                found: input.report_version().to_string(),
            });
        }
    }

    debug!("Merging {} reports at version {}", inputs.len(), expected);

    let mut output = ProjectReport::with_version(expected, ReportKind::Accumulated, counter);
    for input in inputs {
        merge_report_body(
            &input.report,
            &input.global_index,
            &mut output.report,
            &mut output.global_index,
        )?;
    }

    debug!(
        "Merged into {} source node records",
        output.report.source_node_record_count()
    );
    Ok(output)
}

/// Merge N module reports of the same module.
///
/// The inputs carry the global index of the report they were taken from,
/// since their ids resolve only there. The result is re-homed into
/// `target_index`.
///
/// # Errors
/// * `MergeError::NothingToMerge` - called with zero inputs
/// * `MergeError::ModuleIdentityMismatch` - inputs belong to different modules
/// * `MergeError::ReportVersionMismatch` - inputs disagree on their version
pub fn merge_module_reports(
    inputs: &[(&GlobalIndex, &ModuleReport)],
    target_index: &mut GlobalIndex,
) -> Result<ModuleReport, MergeError> {
    let Some((_, first)) = inputs.first() else {
        return Err(MergeError::NothingToMerge);
    };

    let identity = &first.identity;
    let expected = first.body.report_version;
    for (_, module_report) in inputs {
        if module_report.identity != *identity {
            return Err(MergeError::ModuleIdentityMismatch {
                expected: identity.identifier(),
                found: module_report.identity.identifier(),
            });
        }
        if module_report.body.report_version != expected {
            return Err(MergeError::ReportVersionMismatch {
                expected: expected.to_string(),
                found: module_report.body.report_version.to_string(),
            });
        }
    }

    let module_id = target_index.ensure_module(identity);
    let mut output = ModuleReport::new(module_id, identity.clone(), expected, ReportKind::Accumulated);
    for (index, module_report) in inputs {
        merge_report_body(&module_report.body, index, &mut output.body, target_index)?;
    }
    Ok(output)
}

/// Fold one report body into the accumulator, matching files by path
/// string, modules by identity and nodes by their identity triple
fn merge_report_body(
    src: &Report,
    src_index: &GlobalIndex,
    dst: &mut Report,
    dst_index: &mut GlobalIndex,
) -> Result<(), MergeError> {
    if dst.relative_root_dir.is_none() {
        dst.relative_root_dir = src.relative_root_dir.clone();
    }
    dst.headless_sensor_values.add(&src.headless_sensor_values);

    for file in src.intern.values() {
        let dst_path = src_index.insert_path_into(file.path_id, dst_index)?;
        let dst_file = dst
            .intern
            .entry(dst_path)
            .or_insert_with(|| SourceFileRecord::new(dst_path));
        merge_file(file, src_index, dst_file, dst_index)?;
    }

    for file in src.lang_internal.values() {
        let dst_path = src_index.insert_path_into(file.path_id, dst_index)?;
        let dst_file = dst
            .lang_internal
            .entry(dst_path)
            .or_insert_with(|| SourceFileRecord::new(dst_path));
        merge_file(file, src_index, dst_file, dst_index)?;
    }

    for module_report in src.extern_modules.values() {
        let dst_module_id = dst_index.ensure_module(&module_report.identity);
        let report_version = dst.report_version;
        let dst_module = dst.extern_modules.entry(dst_module_id).or_insert_with(|| {
            ModuleReport::new(
                dst_module_id,
                module_report.identity.clone(),
                report_version,
                ReportKind::Accumulated,
            )
        });
        merge_report_body(&module_report.body, src_index, &mut dst_module.body, dst_index)?;
    }

    Ok(())
}

/// Fold one file's records into the accumulator file
fn merge_file(
    src_file: &SourceFileRecord,
    src_index: &GlobalIndex,
    dst_file: &mut SourceFileRecord,
    dst_index: &mut GlobalIndex,
) -> Result<(), MergeError> {
    for record in src_file.source_nodes.values() {
        let dst_id = src_index.insert_source_node_into(record.id, dst_index)?;
        let dst_record = dst_file
            .source_nodes
            .entry(dst_id)
            .or_insert_with(|| record.empty_of_same_kind(dst_id));

        if dst_record.body.kind_tag() != record.body.kind_tag() {
            let identifier = src_index.source_node_identity(record.id)?.global_identifier();
            return Err(MergeError::RecordKindMismatch {
                identifier,
                existing: dst_record.body.kind_name(),
                found: record.body.kind_name(),
            });
        }

        dst_record.sensor_values.add(&record.sensor_values);

        if let Some(src_maps) = record.references() {
            // same kind tag, so the accumulator record carries maps too
            let Some(dst_maps) = dst_record.references_mut() else {
                continue;
            };
            for (kind, target_id, reference) in src_maps.iter_all() {
                let dst_target = src_index.insert_source_node_into(target_id, dst_index)?;
                let dst_reference = dst_maps
                    .bucket_mut(kind)
                    .entry(dst_target)
                    .or_insert_with(|| SourceNodeRecord::reference(dst_target, kind));
                dst_reference.sensor_values.add(&reference.sensor_values);
            }
        }
    }
    Ok(())
}
