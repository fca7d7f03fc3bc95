//! JSON projection files.
//!
//! The JSON form is the human-debuggable mirror of the binary `.oak` tree,
//! used for reference test fixtures. It round-trips losslessly against the
//! binary form except that zero-valued sensor fields are omitted in JSON
//! and reconstructed as zero on load.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use log::{debug, info};

use crate::model::{InternalIdCounter, ProjectReport};
use crate::utils::error::OutputError;

use super::{ensure_parent_dir, validate_output_path};

/// Write a report as pretty-printed JSON
///
/// **Public** - main entry point for JSON output
///
/// # Errors
/// * `OutputError::InvalidPath` - path is empty, a directory, or its parent
///   cannot be created
/// * `OutputError::SerializationFailed` - JSON serialization error
/// * `OutputError::WriteFailed` - I/O error during write
pub fn write_report_json(
    report: &ProjectReport,
    output_path: impl AsRef<Path>,
) -> Result<(), OutputError> {
    let output_path = output_path.as_ref();

    info!("Writing JSON report to: {}", output_path.display());

    validate_output_path(output_path)?;
    ensure_parent_dir(output_path)?;

    let file = File::create(output_path).map_err(OutputError::WriteFailed)?;
    let mut writer = BufWriter::new(file);
    serde_json::to_writer_pretty(&mut writer, report)
        .map_err(OutputError::SerializationFailed)?;
    writer.write_all(b"\n")?;
    writer.flush()?;

    Ok(())
}

/// Read a report from its JSON projection
///
/// # Errors
/// * `OutputError::WriteFailed` - file read error (reusing WriteFailed for I/O)
/// * `OutputError::SerializationFailed` - JSON parse error
pub fn read_report_json(
    input_path: impl AsRef<Path>,
    counter: &mut InternalIdCounter,
) -> Result<ProjectReport, OutputError> {
    let input_path = input_path.as_ref();

    debug!("Reading JSON report from: {}", input_path.display());

    let json = std::fs::read_to_string(input_path)?;
    let report = ProjectReport::from_json(&json, counter)
        .map_err(OutputError::SerializationFailed)?;

    debug!(
        "JSON report loaded: version {}, kind {}",
        report.report_version(),
        report.kind().as_str()
    );

    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ReportKind, SensorValues, SourceNodeIdentity};

    #[test]
    fn test_json_file_round_trip_matches_binary_form() {
        let mut counter = InternalIdCounter::new();
        let mut report = ProjectReport::new(ReportKind::Measurement, &mut counter);
        report
            .add_sample(
                &SourceNodeIdentity::own_code("./src/app.ts", "{root}"),
                &SensorValues {
                    profiler_hits: 2,
                    self_cpu_time: 10,
                    ..SensorValues::zero()
                },
            )
            .unwrap();

        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("report.json");

        write_report_json(&report, &path).unwrap();
        let loaded = read_report_json(&path, &mut counter).unwrap();

        assert_eq!(loaded, report);
        // the reloaded projection encodes to the same bytes as the original
        assert_eq!(loaded.to_bytes().unwrap(), report.to_bytes().unwrap());
    }

    #[test]
    fn test_json_file_omits_zero_sensor_fields() {
        let mut counter = InternalIdCounter::new();
        let mut report = ProjectReport::new(ReportKind::Measurement, &mut counter);
        report
            .add_sample(
                &SourceNodeIdentity::own_code("./src/app.ts", "{root}"),
                &SensorValues {
                    profiler_hits: 1,
                    ..SensorValues::zero()
                },
            )
            .unwrap();

        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("report.json");
        write_report_json(&report, &path).unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        assert!(text.contains("profilerHits"));
        assert!(!text.contains("selfCpuTime"));
    }
}
