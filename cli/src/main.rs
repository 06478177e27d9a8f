// Copyright (c) 2026 ALAS Technology. MIT License.
// See LICENSE for details.

//! # Vesting Scenario Runner
//!
//! Entry point for the `vesting-cli` binary. Parses CLI arguments,
//! initializes logging, and replays vesting vault scenarios against the
//! in-memory ledger.
//!
//! The binary supports three subcommands:
//!
//! - `run`     — execute a scenario file and print the JSON report
//! - `sample`  — print a sample scenario
//! - `version` — print build version information

mod cli;
mod logging;
mod scenario;

use anyhow::{Context, Result};
use clap::Parser;

use cli::{Commands, VestingCli};
use scenario::Scenario;

fn main() -> Result<()> {
    let cli = VestingCli::parse();
    logging::init_logging(&cli.logging.log_level, cli.logging.log_format);

    match cli.command {
        Commands::Run(args) => run_scenario(args),
        Commands::Sample => print_json(&Scenario::sample(), false),
        Commands::Version => {
            print_version();
            Ok(())
        }
    }
}

/// Runs a scenario file and prints its report. Fails if any step missed
/// its expectation.
fn run_scenario(args: cli::RunArgs) -> Result<()> {
    tracing::info!(scenario = %args.scenario.display(), "running scenario");

    let scenario = Scenario::load(&args.scenario)?;
    let report = scenario::run(&scenario)
        .with_context(|| format!("failed to set up scenario {}", args.scenario.display()))?;
    print_json(&report, args.compact)?;

    let failed: Vec<usize> = report.failures().map(|s| s.index).collect();
    if !failed.is_empty() {
        anyhow::bail!("expectations not met at steps {failed:?}");
    }
    Ok(())
}

fn print_json<T: serde::Serialize>(value: &T, compact: bool) -> Result<()> {
    let json = if compact {
        serde_json::to_string(value)
    } else {
        serde_json::to_string_pretty(value)
    }
    .context("failed to serialize output")?;
    println!("{json}");
    Ok(())
}

/// Prints version information to stdout.
fn print_version() {
    println!("vesting-cli {}", env!("CARGO_PKG_VERSION"));
    println!("rustc       {}", rustc_version());
}

/// Returns the Rust compiler version used to build this binary.
fn rustc_version() -> &'static str {
    option_env!("RUSTC_VERSION").unwrap_or("unknown")
}
