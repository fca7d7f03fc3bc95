//! Binary `.oak` report files.

use std::path::Path;

use log::{debug, info, warn};

use crate::model::{InternalIdCounter, ProjectReport};
use crate::utils::error::OutputError;

use super::{ensure_parent_dir, validate_output_path};

/// Write a report to a binary `.oak` file
///
/// **Public** - main entry point for binary output
///
/// # Arguments
/// * `report` - Report to write
/// * `output_path` - Path to the output file
///
/// # Errors
/// * `OutputError::InvalidPath` - path is empty, a directory, or its parent
///   cannot be created
/// * `OutputError::Codec` - the report does not fit the wire format
/// * `OutputError::WriteFailed` - I/O error during write
pub fn write_report(
    report: &ProjectReport,
    output_path: impl AsRef<Path>,
) -> Result<(), OutputError> {
    let output_path = output_path.as_ref();

    info!("Writing report to: {}", output_path.display());

    validate_output_path(output_path)?;
    ensure_parent_dir(output_path)?;

    let bytes = report.to_bytes()?;
    std::fs::write(output_path, &bytes)?;

    info!("Report written successfully ({} bytes)", bytes.len());
    Ok(())
}

/// Read a report from a binary `.oak` file
///
/// **Public** - used by merge, convert and inspect
///
/// # Errors
/// * `OutputError::WriteFailed` - file read error (reusing WriteFailed for I/O)
/// * `OutputError::Codec` - the buffer is not a valid report
pub fn read_report(
    input_path: impl AsRef<Path>,
    counter: &mut InternalIdCounter,
) -> Result<ProjectReport, OutputError> {
    let input_path = input_path.as_ref();

    debug!("Reading report from: {}", input_path.display());

    let bytes = std::fs::read(input_path)?;
    let (report, remainder) = ProjectReport::from_bytes(&bytes, counter)?;

    if !remainder.is_empty() {
        warn!(
            "{} trailing bytes after report in {}",
            remainder.len(),
            input_path.display()
        );
    }

    debug!(
        "Report loaded: version {}, kind {}",
        report.report_version(),
        report.kind().as_str()
    );

    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ReportKind, SensorValues, SourceNodeIdentity};

    fn create_test_report(counter: &mut InternalIdCounter) -> ProjectReport {
        let mut report = ProjectReport::new(ReportKind::Measurement, counter);
        report
            .add_sample(
                &SourceNodeIdentity::own_code("./src/app.ts", "{root}.{function:run}"),
                &SensorValues {
                    profiler_hits: 1,
                    self_cpu_time: 50,
                    self_cpu_energy_consumption: 0.5,
                    ..SensorValues::zero()
                },
            )
            .unwrap();
        report
    }

    #[test]
    fn test_write_and_read_report() {
        let mut counter = InternalIdCounter::new();
        let report = create_test_report(&mut counter);
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("measurement.oak");

        write_report(&report, &path).unwrap();
        let loaded = read_report(&path, &mut counter).unwrap();

        assert_eq!(loaded, report);
    }

    #[test]
    fn test_write_creates_parent_dirs() {
        let mut counter = InternalIdCounter::new();
        let report = create_test_report(&mut counter);
        let temp_dir = tempfile::tempdir().unwrap();
        let nested_path = temp_dir.path().join("nested/dirs/measurement.oak");

        write_report(&report, &nested_path).unwrap();
        assert!(nested_path.exists());
    }

    #[test]
    fn test_write_rejects_directory_path() {
        let mut counter = InternalIdCounter::new();
        let report = create_test_report(&mut counter);
        let temp_dir = tempfile::tempdir().unwrap();

        let result = write_report(&report, temp_dir.path());
        assert!(result.is_err());
    }

    #[test]
    fn test_read_rejects_truncated_file() {
        let mut counter = InternalIdCounter::new();
        let report = create_test_report(&mut counter);
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("truncated.oak");

        let mut bytes = report.to_bytes().unwrap();
        bytes.truncate(bytes.len() / 2);
        std::fs::write(&path, &bytes).unwrap();

        let result = read_report(&path, &mut counter);
        assert!(result.is_err());
    }
}
