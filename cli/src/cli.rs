//! # CLI Interface
//!
//! Defines the command-line argument structure for `vesting-cli` using
//! `clap` derive. Subcommands: `run`, `sample`, and `version`.

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

use crate::logging::LogFormat;

/// Vesting vault scenario runner.
///
/// Deploys a token and a vesting vault on an in-memory ledger, replays a
/// scripted sequence of approve/fund/advance/withdraw/blacklist steps, and
/// prints a JSON report of every outcome and the final balances.
#[derive(Parser, Debug)]
#[command(
    name = "vesting-cli",
    about = "Vesting vault scenario runner",
    version,
    propagate_version = true
)]
pub struct VestingCli {
    #[command(flatten)]
    pub logging: LoggingArgs,

    /// Subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,
}

/// Top-level subcommands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run a scenario file and print the report.
    Run(RunArgs),
    /// Print a sample scenario to stdout.
    Sample,
    /// Print version information and exit.
    Version,
}

/// Logging flags shared by every subcommand.
#[derive(Args, Debug)]
pub struct LoggingArgs {
    /// Log output format.
    #[arg(
        long,
        global = true,
        env = "VESTING_LOG_FORMAT",
        value_enum,
        default_value_t = LogFormat::Pretty
    )]
    pub log_format: LogFormat,

    /// Log level for the runner and the contracts (ignored if `RUST_LOG` is set).
    #[arg(long, global = true, env = "VESTING_LOG_LEVEL", default_value = "info")]
    pub log_level: String,
}

/// Arguments for the `run` subcommand.
#[derive(Args, Debug)]
pub struct RunArgs {
    /// Path to the scenario file (JSON).
    #[arg(long, short = 's', env = "VESTING_SCENARIO")]
    pub scenario: PathBuf,

    /// Print the report on a single line instead of pretty-printed.
    #[arg(long)]
    pub compact: bool,
}
