//! CLI argument definitions

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "ntpfleet")]
#[command(about = "Namespace-backed NTP test fleet orchestrator", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Create one instance
    Create {
        /// Instance id
        #[arg(short = 'i', long, default_value_t = 1)]
        instance: u32,

        /// Subnet prefix, three octets (e.g. 192.168.100)
        #[arg(short = 's', long, default_value = "192.168.100")]
        subnet: String,

        /// Clock offset in seconds (signed)
        #[arg(short = 'o', long, default_value_t = 0)]
        offset: i64,

        /// Reported stratum level
        #[arg(short = 't', long, default_value_t = 2)]
        stratum: u8,

        /// Leap indicator (0-3)
        #[arg(short = 'l', long, default_value_t = 0)]
        leap: u8,
    },

    /// Create a contiguous batch of instances
    Batch {
        /// First instance id (inclusive)
        #[arg(long, default_value_t = 1)]
        start: u32,

        /// Last instance id (inclusive)
        #[arg(long, default_value_t = 1)]
        end: u32,

        /// Subnet prefix, three octets (e.g. 192.168.100)
        #[arg(short = 's', long, default_value = "192.168.100")]
        subnet: String,

        /// Clock offset in seconds (signed)
        #[arg(short = 'o', long, default_value_t = 0)]
        offset: i64,

        /// Reported stratum level
        #[arg(short = 't', long, default_value_t = 2)]
        stratum: u8,

        /// Leap indicator (0-3)
        #[arg(short = 'l', long, default_value_t = 0)]
        leap: u8,
    },

    /// Delete one instance
    Delete {
        /// Instance id
        #[arg(short = 'i', long, default_value_t = 1)]
        instance: u32,
    },

    /// Show the server process and log for one instance
    Logs {
        /// Instance id
        #[arg(short = 'i', long, default_value_t = 1)]
        instance: u32,
    },

    /// List all live instances
    List,

    /// Remove every instance, the shared bridge, and stale directories
    Cleanup,
}
