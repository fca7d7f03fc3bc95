//! Command implementations for the CLI.
//!
//! The commands only do file I/O and argument plumbing; every computation
//! (merge, normalization, validation, codec) happens in the library.

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use log::info;

use oak_report::model::{
    merge_project_reports, normalize_project_report, InternalIdCounter, ProjectReport,
};
use oak_report::output::{read_report, read_report_json, write_report, write_report_json};
use oak_report::utils::config::OAK_FILE_EXTENSION;

/// Arguments for the merge command
///
/// **Public** - used by main.rs to construct from CLI args
#[derive(Debug, Clone)]
pub struct MergeArgs {
    /// Input report files
    pub inputs: Vec<PathBuf>,

    /// Output path for the accumulated report
    pub output: PathBuf,
}

/// Validate merge arguments before any file is touched
pub fn validate_merge_args(args: &MergeArgs) -> Result<()> {
    if args.inputs.is_empty() {
        bail!("at least one input report is required");
    }
    Ok(())
}

/// Load a report file, choosing the codec by extension
fn load_report(path: &Path, counter: &mut InternalIdCounter) -> Result<ProjectReport> {
    match path.extension().and_then(|e| e.to_str()) {
        Some(ext) if ext == OAK_FILE_EXTENSION => read_report(path, counter)
            .with_context(|| format!("Failed to read report {}", path.display())),
        Some("json") => read_report_json(path, counter)
            .with_context(|| format!("Failed to read JSON report {}", path.display())),
        _ => bail!("Unsupported report extension: {}", path.display()),
    }
}

/// Execute the inspect command: print a summary of a report file
pub fn execute_inspect(file: &Path) -> Result<()> {
    let mut counter = InternalIdCounter::new();
    let report = load_report(file, &mut counter)?;

    println!("Report: {}", file.display());
    println!("  Version: {}", report.report_version());
    println!("  Kind: {}", report.kind().as_str());
    if let Some(dir) = &report.report.relative_root_dir {
        println!("  Relative root dir: {dir}");
    }
    println!("  Modules: {}", report.global_index.module_count());
    println!(
        "  Own files: {} | Runtime files: {} | Module reports: {}",
        report.report.intern.len(),
        report.report.lang_internal.len(),
        report.report.extern_modules.len()
    );
    println!(
        "  Source node records: {}",
        report.report.source_node_record_count()
    );

    let headless = &report.report.headless_sensor_values;
    if !headless.is_zero() {
        println!(
            "  Headless: {}us cpu, {}mJ cpu energy, {}mJ ram energy",
            headless.self_cpu_time,
            headless.self_cpu_energy_consumption,
            headless.self_ram_energy_consumption
        );
    }

    Ok(())
}

/// Execute the merge command: accumulate N reports into one
///
/// # Errors
/// * Version mismatches and empty input sets surface as merge errors
/// * File read/write errors
pub fn execute_merge(args: MergeArgs) -> Result<()> {
    validate_merge_args(&args)?;

    let mut counter = InternalIdCounter::new();
    let mut reports = Vec::with_capacity(args.inputs.len());
    for path in &args.inputs {
        reports.push(load_report(path, &mut counter)?);
    }

    info!("Merging {} reports", reports.len());
    let inputs: Vec<&ProjectReport> = reports.iter().collect();
    let merged = merge_project_reports(&inputs, &mut counter)?;

    // normalize so identical inputs always produce identical output bytes
    let normalized = normalize_project_report(&merged, &mut counter)?;

    write_report(&normalized, &args.output)
        .with_context(|| format!("Failed to write {}", args.output.display()))?;
    println!(
        "Merged {} reports into {}",
        reports.len(),
        args.output.display()
    );
    Ok(())
}

/// Execute the convert command: binary to JSON or JSON to binary,
/// chosen by the output extension
pub fn execute_convert(input: &Path, output: &Path) -> Result<()> {
    let mut counter = InternalIdCounter::new();
    let report = load_report(input, &mut counter)?;

    match output.extension().and_then(|e| e.to_str()) {
        Some(ext) if ext == OAK_FILE_EXTENSION => write_report(&report, output)
            .with_context(|| format!("Failed to write {}", output.display()))?,
        Some("json") => write_report_json(&report, output)
            .with_context(|| format!("Failed to write {}", output.display()))?,
        _ => bail!("Unsupported output extension: {}", output.display()),
    }

    println!("Converted {} -> {}", input.display(), output.display());
    Ok(())
}

/// Execute the validate command: check the aggregate invariants
pub fn execute_validate(file: &Path) -> Result<()> {
    let mut counter = InternalIdCounter::new();
    let report = load_report(file, &mut counter)?;

    report
        .validate()
        .with_context(|| format!("Report {} violates its aggregate invariants", file.display()))?;

    println!("✓ Valid report");
    println!("  Version: {}", report.report_version());
    println!("  Kind: {}", report.kind().as_str());
    println!(
        "  Source node records: {}",
        report.report.source_node_record_count()
    );
    Ok(())
}
