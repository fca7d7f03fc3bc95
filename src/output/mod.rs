//! Report file output and loading.
//!
//! This is the file-I/O layer around the pure core: it moves byte buffers
//! and JSON text between disk and [`crate::model::ProjectReport`]. Nothing
//! in here computes over the report tree.

pub mod binary;
pub mod json;

pub use binary::{read_report, write_report};
pub use json::{read_report_json, write_report_json};

use std::path::Path;

use log::debug;

use crate::utils::error::OutputError;

/// Validate that an output path is usable
///
/// **Private** - internal validation shared by the writers
fn validate_output_path(path: &Path) -> Result<(), OutputError> {
    if path.as_os_str().is_empty() {
        return Err(OutputError::InvalidPath("Path is empty".to_string()));
    }

    if path.exists() && path.is_dir() {
        return Err(OutputError::InvalidPath(format!(
            "Path is a directory: {}",
            path.display()
        )));
    }

    Ok(())
}

/// Create the parent directories of an output path if needed
///
/// **Private** - internal utility shared by the writers
fn ensure_parent_dir(path: &Path) -> Result<(), OutputError> {
    if let Some(parent) = path.parent() {
        if !parent.exists() {
            debug!("Creating parent directories: {}", parent.display());
            std::fs::create_dir_all(parent).map_err(|e| {
                OutputError::InvalidPath(format!(
                    "Cannot create directory {}: {}",
                    parent.display(),
                    e
                ))
            })?;
        }
    }
    Ok(())
}
