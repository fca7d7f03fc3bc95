//! Oak Report CLI
//!
//! Inspect, merge, convert and validate profiler report files (`.oak`
//! and their JSON projection).

use anyhow::Result;
use clap::{Parser, Subcommand};
use env_logger::Env;
use std::path::PathBuf;

mod commands;

use commands::{
    execute_convert, execute_inspect, execute_merge, execute_validate, MergeArgs,
};

/// Oak Report - profiler report aggregation and persistence
#[derive(Parser, Debug)]
#[command(name = "oak-report")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

/// Available commands
#[derive(Subcommand, Debug)]
enum Commands {
    /// Summarize a report file
    Inspect {
        /// Path to a .oak or .json report file
        #[arg(short, long)]
        file: PathBuf,
    },

    /// Merge measurement reports into one accumulated report
    Merge {
        /// Input report files
        #[arg(short, long, required = true, num_args = 1..)]
        inputs: Vec<PathBuf>,

        /// Output path for the accumulated report
        #[arg(short, long, default_value = "accumulated.oak")]
        output: PathBuf,
    },

    /// Convert between the binary and JSON report forms
    Convert {
        /// Input report file
        #[arg(short, long)]
        input: PathBuf,

        /// Output report file; the extension picks the format
        #[arg(short, long)]
        output: PathBuf,
    },

    /// Check the aggregate invariants of a report file
    Validate {
        /// Path to a .oak or .json report file
        #[arg(short, long)]
        file: PathBuf,
    },
}

fn main() -> Result<()> {
    // Parse CLI arguments
    let cli = Cli::parse();

    // Setup logging
    let log_level = if cli.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(Env::default().default_filter_or(log_level)).init();

    // Execute command
    match cli.command {
        Commands::Inspect { file } => execute_inspect(&file)?,

        Commands::Merge { inputs, output } => {
            execute_merge(MergeArgs { inputs, output })?;
        }

        Commands::Convert { input, output } => execute_convert(&input, &output)?,

        Commands::Validate { file } => execute_validate(&file)?,
    }

    Ok(())
}
