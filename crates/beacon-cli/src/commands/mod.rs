//! CLI command definitions and handlers.

use anyhow::Result;
use clap::{Parser, Subcommand, ValueEnum};

pub mod broadcast;
pub mod serve;
pub mod status;

/// Default address of a running Beacon server.
pub const DEFAULT_SERVER_URL: &str = "http://127.0.0.1:8000";

/// Beacon - real-time WebSocket fan-out server
#[derive(Parser)]
#[command(name = "beacon")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Log output format
    #[arg(long, global = true, value_enum, default_value_t = LogFormat::Pretty, env = "BEACON_LOG_FORMAT")]
    pub log_format: LogFormat,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    /// Human-readable console output
    Pretty,
    /// One JSON object per line
    Json,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start the WebSocket server
    Serve(serve::ServeArgs),

    /// Show the status of a running server
    Status(status::StatusArgs),

    /// Broadcast a message through a running server
    Broadcast(broadcast::BroadcastArgs),
}

impl Cli {
    pub async fn execute(self) -> Result<()> {
        match self.command {
            Commands::Serve(args) => serve::execute(args).await,
            Commands::Status(args) => status::execute(args).await,
            Commands::Broadcast(args) => broadcast::execute(args).await,
        }
    }
}
