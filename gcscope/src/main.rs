//! # gcscope - Main Entry Point
//!
//! Thin shell around [`supervise::run`]: parse arguments, snapshot the
//! session configuration, print the startup banner, then hand control to
//! the supervisor and translate its result into a process exit code.

use std::sync::Arc;

use anyhow::Result;
use clap::Parser;

use gcscope::cli::{Cli, Command};
use gcscope::config::SessionConfig;
use gcscope::domain::SuperviseError;
use gcscope::hooks::CallbackHub;
use gcscope::supervise;

// Exit codes. The child's own code passes through on the success path;
// usage errors exit 2 via clap.
const EXIT_ERROR: i32 = 1;
const EXIT_TARGET_MISSING: i32 = 127;

fn main() {
    env_logger::init();
    std::process::exit(match run() {
        Ok(code) => code,
        Err(e) => {
            let code = exit_code_for(&e);
            eprintln!("error: {e}");
            code
        }
    });
}

fn exit_code_for(err: &anyhow::Error) -> i32 {
    match err.downcast_ref::<SuperviseError>() {
        Some(SuperviseError::TargetNotFound(_)) => EXIT_TARGET_MISSING,
        _ => EXIT_ERROR,
    }
}

#[tokio::main]
async fn run() -> Result<i32> {
    let cli = Cli::parse();
    let Command::Run(args) = cli.command;
    let config = SessionConfig::from_run_args(&args)?;

    // The banner stays off machine-readable and stats-only streams.
    if !config.json && !config.stats_only {
        eprintln!("gcscope v{}", env!("CARGO_PKG_VERSION"));
        eprintln!("running: {}", config.command_line());
    }

    let hub = Arc::new(CallbackHub::new());
    let session = supervise::run(config, hub).await?;
    Ok(session.exit_code)
}
