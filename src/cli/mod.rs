//! CLI interface for poly-exec
//!
//! Provides subcommands for:
//! - `run`: Paper-mode loop (feed, latency monitor, scanner, scavenger)
//! - `snapshot`: Fetch one classified snapshot
//! - `health`: Probe endpoints and print latency stats
//! - `config`: Show the effective configuration

mod health;
mod run;
mod snapshot;

pub use health::HealthArgs;
pub use run::RunArgs;
pub use snapshot::SnapshotArgs;

use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(name = "poly-exec")]
#[command(about = "Market data consistency and execution safety for Polymarket")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Path to configuration file
    #[arg(short, long, default_value = "config.toml")]
    pub config: String,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the paper-mode loop
    Run(RunArgs),
    /// Fetch one market snapshot as JSON
    Snapshot(SnapshotArgs),
    /// Probe endpoints and print latency health
    Health(HealthArgs),
    /// Show the effective configuration
    Config,
}
