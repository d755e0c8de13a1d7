//! hostns CLI
//!
//! Runs commands and host queries inside the namespaces of a host process.

use clap::Parser;
use std::{env, process};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::filter::LevelFilter;

mod cli;
mod commands;

use cli::Cli;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let directives = env::var(EnvFilter::DEFAULT_ENV).unwrap_or_default();

    tracing_subscriber::fmt()
        .with_env_filter(log_filter(&directives, cli.verbose))
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    if let Err(e) = commands::dispatch(cli).await {
        eprintln!("❌ Error: {e:#}");
        process::exit(1);
    }
}

/// `RUST_LOG` directives win; otherwise `--verbose` picks debug over info
fn log_filter(directives: &str, verbose: bool) -> EnvFilter {
    let default = if verbose {
        LevelFilter::DEBUG
    } else {
        LevelFilter::INFO
    };

    EnvFilter::builder()
        .with_default_directive(default.into())
        .parse_lossy(directives)
}
