//! Medir CLI - precision benchmark harness driver
//!
//! # Commands
//!
//! - `run` - Run every configured suite and write result tables
//! - `collect` - Re-collect an existing job's results
//! - `trace` - Generate a standalone trace file

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use medir::error::Result;

/// Medir - precision benchmark harness for memory-subsystem simulators
#[derive(Parser)]
#[command(name = "medir")]
#[command(version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Verbose output (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,
}

#[derive(Subcommand)]
enum Commands {
    /// Run all configured suites under a test-suite root
    ///
    /// Examples:
    ///   medir run tests/precision
    ///   medir run tests/precision --job-id nightly-01
    Run {
        /// Suite root directory containing basedata.yml
        #[arg(value_name = "SUITE_ROOT")]
        suite_root: PathBuf,

        /// Job identifier (defaults to a timestamp)
        #[arg(long)]
        job_id: Option<String>,
    },
    /// Re-collect results from an existing job's output tree
    ///
    /// Examples:
    ///   medir collect tests/precision 20260806-142500
    Collect {
        /// Suite root directory containing basedata.yml
        #[arg(value_name = "SUITE_ROOT")]
        suite_root: PathBuf,

        /// Job identifier of the existing run
        #[arg(value_name = "JOB_ID")]
        job_id: String,
    },
    /// Generate a standalone trace file
    ///
    /// Examples:
    ///   medir trace /tmp/t --start-addr 0 --end-addr 4096 \
    ///       --addr-type ptr-chasing --access-type r --step 64 --critical-load
    Trace {
        /// Output directory (receives trace.tmp and optional info.json)
        #[arg(value_name = "OUT_PATH")]
        out_path: PathBuf,

        /// First address (inclusive)
        #[arg(long)]
        start_addr: u64,

        /// End address (exclusive)
        #[arg(long)]
        end_addr: u64,

        /// Address pattern: seq or ptr-chasing
        #[arg(long)]
        addr_type: String,

        /// Access kind: r or w
        #[arg(long)]
        access_type: String,

        /// Address step in bytes
        #[arg(long, default_value_t = 1)]
        step: u64,

        /// Emit reads as critical loads
        #[arg(long)]
        critical_load: bool,

        /// Description written to info.json
        #[arg(long)]
        desc: Option<String>,

        /// RNG seed for reproducible pointer-chasing traces
        #[arg(long)]
        seed: Option<u64>,
    },
}

fn init_logging(verbose: u8) {
    let default_level = match verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match cli.command {
        Commands::Run { suite_root, job_id } => medir::cli::run_harness(&suite_root, job_id),
        Commands::Collect { suite_root, job_id } => medir::cli::collect_job(&suite_root, &job_id),
        Commands::Trace {
            out_path,
            start_addr,
            end_addr,
            addr_type,
            access_type,
            step,
            critical_load,
            desc,
            seed,
        } => medir::cli::generate_trace(
            &out_path,
            start_addr,
            end_addr,
            &addr_type,
            &access_type,
            step,
            critical_load,
            desc.as_deref(),
            seed,
        ),
    }
}
