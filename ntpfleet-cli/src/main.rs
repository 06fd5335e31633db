//! ntpfleet CLI
//!
//! Provisions and supervises a fleet of clock-skewed NTP server instances,
//! each isolated in its own network namespace on a shared bridge.

use clap::Parser;
use std::process;
use tracing::Level;

mod cli;
mod commands;

use cli::Cli;

/// Check if running as root
fn is_root() -> bool {
    unsafe { libc::geteuid() == 0 }
}

#[tokio::main]
async fn main() {
    // Parse command-line arguments
    let cli = Cli::parse();

    // Setup logging based on verbosity
    let log_level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };

    tracing_subscriber::fmt()
        .with_max_level(log_level)
        .with_target(false)
        .init();

    // Managing namespaces and interfaces needs root; fail before any action
    if !is_root() {
        eprintln!("❌ Error: Permission denied: managing network namespaces requires root");
        process::exit(1);
    }

    // Execute the command
    if let Err(e) = commands::dispatch(cli.command).await {
        eprintln!("❌ Error: {e}");
        process::exit(1);
    }
}
