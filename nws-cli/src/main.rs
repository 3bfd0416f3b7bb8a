//! Binary crate for the `nws` command-line tool.
//!
//! This crate focuses on:
//! - Parsing CLI arguments
//! - Interactive location/action prompts
//! - Printing text results and writing radar overlays

use std::process::ExitCode;

use clap::Parser;
use nws_core::TempFileRegistry;
use tracing_subscriber::EnvFilter;

mod cli;
mod display;

fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default)),
        )
        .with_writer(std::io::stderr)
        .try_init();
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    let cmd = cli::Cli::parse();
    init_tracing(cmd.verbose);

    let registry = TempFileRegistry::new();

    tokio::select! {
        result = cmd.run(registry.clone()) => result,
        _ = tokio::signal::ctrl_c() => {
            let removed = registry.purge();
            tracing::info!(removed, "interrupted, radar files cleaned up");
            std::process::exit(130);
        }
    }
}
