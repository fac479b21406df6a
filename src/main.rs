//! Main application entry point (CLI binary).
//!
//! This is a thin wrapper around the `task_intake` library that handles:
//! - Command-line argument parsing
//! - Environment variable loading (.env file)
//! - Logger initialization
//! - User-facing output formatting
//!
//! All core functionality is implemented in the library crate.

use anyhow::{Context, Result};
use clap::Parser;
use std::process;

use task_intake::initialization::init_logger_with;
use task_intake::{run_service, Config};

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables from .env file (if it exists)
    let _ = dotenvy::dotenv();

    let config = Config::parse();

    let log_level = config.log_level.clone();
    let log_format = config.log_format.clone();
    init_logger_with(log_level.into(), log_format).context("Failed to initialize logger")?;

    match run_service(config).await {
        Ok(report) => {
            println!(
                "Stopped after {:.1}s: {} task{} accepted ({} throttled), {} processed, {} error{}",
                report.elapsed_seconds,
                report.accepted + report.throttled,
                if report.accepted + report.throttled == 1 { "" } else { "s" },
                report.throttled,
                report.processed,
                report.errors,
                if report.errors == 1 { "" } else { "s" }
            );
            Ok(())
        }
        Err(e) => {
            eprintln!("task_intake error: {:#}", e);
            process::exit(1);
        }
    }
}
