//! Web server command.

use anyhow::{Context, Result};
use beacon_core::ServerConfig;
use clap::Args;
use std::path::PathBuf;

use crate::output;

#[derive(Args)]
pub struct ServeArgs {
    /// TOML config file; flags and environment variables override it
    #[arg(long, short, env = "BEACON_CONFIG")]
    pub config: Option<PathBuf>,

    /// Port to listen on [default: 8000]
    #[arg(long, env = "BEACON_PORT")]
    pub port: Option<u16>,

    /// Host to bind to [default: 127.0.0.1]
    #[arg(long, env = "BEACON_HOST")]
    pub host: Option<String>,

    /// Seconds between periodic notifications [default: 10]
    #[arg(long, env = "BEACON_NOTIFICATION_INTERVAL")]
    pub notification_interval: Option<u64>,

    /// Seconds clients get to disconnect on shutdown [default: 1800]
    #[arg(long, env = "BEACON_DRAIN_TIMEOUT")]
    pub drain_timeout: Option<u64>,

    /// Hard limit in seconds on the whole shutdown [default: 1800]
    #[arg(long, env = "BEACON_SHUTDOWN_TIMEOUT")]
    pub shutdown_timeout: Option<u64>,

    /// Seconds a single client send may take [default: 10]
    #[arg(long, env = "BEACON_SEND_TIMEOUT")]
    pub send_timeout: Option<u64>,

    /// Also write logs to a file
    #[arg(long)]
    pub log: bool,

    /// Log file path (implies --log) [default: beacon.log]
    #[arg(long)]
    pub log_file: Option<PathBuf>,
}

impl ServeArgs {
    /// Defaults, then the config file, then flags and environment.
    pub fn resolve_config(&self) -> Result<ServerConfig> {
        let mut config = match &self.config {
            Some(path) => ServerConfig::from_file(path)
                .with_context(|| format!("Failed to load config from {}", path.display()))?,
            None => ServerConfig::default(),
        };

        if let Some(host) = &self.host {
            config.host = host.clone();
        }
        if let Some(port) = self.port {
            config.port = port;
        }
        if let Some(secs) = self.notification_interval {
            config.notification_interval_secs = secs;
        }
        if let Some(secs) = self.drain_timeout {
            config.drain_timeout_secs = secs;
        }
        if let Some(secs) = self.shutdown_timeout {
            config.shutdown_timeout_secs = secs;
        }
        if let Some(secs) = self.send_timeout {
            config.send_timeout_secs = secs;
        }

        config.validate()?;
        Ok(config)
    }

    /// Where to write the log file, if file logging is on.
    pub fn log_path(&self) -> Option<PathBuf> {
        match (&self.log_file, self.log) {
            (Some(path), _) => Some(path.clone()),
            (None, true) => Some(PathBuf::from("beacon.log")),
            (None, false) => None,
        }
    }
}

pub async fn execute(args: ServeArgs) -> Result<()> {
    let config = args.resolve_config()?;
    output::print_banner(&config);
    beacon_web::run_server(config).await
}
