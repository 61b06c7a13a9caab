//! mirror - Command-line interface for the one-way synchronization engine.
//!
//! Parses arguments into a SyncConfig, wires up logging, runs the
//! pipeline, and maps the outcome to an exit code: configuration failures
//! are fatal, per-entry and per-action failures are reported but leave the
//! exit status at zero.

use clap::Parser;
use engine::{EngineError, SyncConfig, SyncReport};
use std::path::PathBuf;

/// mirror - replicate a directory tree one way
#[derive(Parser, Debug)]
#[command(name = "mirror")]
#[command(version = "0.1.0")]
#[command(about = "Replicates new and changed entries from a source tree to a destination tree")]
struct Args {
    /// Source directory
    #[arg(value_name = "SOURCE_DIR")]
    source: PathBuf,

    /// Destination directory (created if absent)
    #[arg(value_name = "DESTINATION_DIR")]
    destination: PathBuf,

    /// Number of fingerprint workers
    #[arg(short = 'n', value_name = "COUNT", default_value_t = 2)]
    workers: usize,

    /// Enable verbose output
    #[arg(short = 'v', long)]
    verbose: bool,

    /// Compare by size, modification time and mode only (skip content
    /// fingerprints)
    #[arg(long = "date-size-only")]
    date_size_only: bool,

    /// Fingerprint sequentially regardless of -n
    #[arg(long = "no-parallel")]
    no_parallel: bool,

    /// Report the actions a run would take without executing them
    #[arg(long = "dry-run")]
    dry_run: bool,
}

impl Args {
    fn to_config(&self) -> SyncConfig {
        SyncConfig {
            source: self.source.clone(),
            destination: self.destination.clone(),
            worker_count: self.workers,
            parallel: !self.no_parallel,
            fingerprint: !self.date_size_only,
            dry_run: self.dry_run,
            verbose: self.verbose,
        }
    }
}

fn main() {
    let args = Args::parse();
    init_logging(args.verbose);
    tracing::debug!(?args, "parsed arguments");

    let exit_code = match run_cli(&args) {
        Ok(report) => {
            print_summary(&report);
            0
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            2
        }
    };

    std::process::exit(exit_code);
}

/// Main CLI logic - separated for testability
fn run_cli(args: &Args) -> Result<SyncReport, EngineError> {
    let config = args.to_config();
    engine::run(&config)
}

fn init_logging(verbose: bool) {
    let default_directive = if verbose { "debug" } else { "info" };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_directive));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn print_summary(report: &SyncReport) {
    if report.dry_run {
        eprintln!(
            "Dry run: {} of {} source entries would be replicated",
            report.actions_planned, report.source_entries
        );
        return;
    }

    eprintln!("Synchronization complete!");
    eprintln!(
        "Summary: {} entries scanned, {} actions, {} directories created, {} files copied ({} bytes)",
        report.source_entries,
        report.actions_planned,
        report.directories_created,
        report.files_copied,
        report.bytes_copied
    );

    if report.fingerprint_failures > 0 {
        eprintln!(
            "Warning: {} entries could not be fingerprinted and were copied conservatively",
            report.fingerprint_failures
        );
    }
    if report.replication_failures > 0 {
        eprintln!(
            "Warning: {} actions failed to apply; see the log above",
            report.replication_failures
        );
    }
}
