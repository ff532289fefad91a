//! Server configuration.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::broadcast::DEFAULT_SEND_TIMEOUT;
use crate::drain::DEFAULT_DRAIN_TIMEOUT;
use crate::error::{BeaconError, BeaconResult};
use crate::lifecycle::DEFAULT_SHUTDOWN_TIMEOUT;
use crate::notifier::DEFAULT_NOTIFICATION_INTERVAL;

/// Configuration for the Beacon server.
///
/// Every field has a default, so a config file only needs the values it
/// changes.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Host to bind (default `"127.0.0.1"`).
    pub host: String,
    /// Port to bind (default `8000`, `0` picks a free port).
    pub port: u16,
    /// Seconds between periodic notifications.
    pub notification_interval_secs: u64,
    /// Seconds clients get to disconnect before they are force-closed.
    pub drain_timeout_secs: u64,
    /// Hard upper bound in seconds on the whole shutdown wait.
    pub shutdown_timeout_secs: u64,
    /// Seconds a single client send may take during a broadcast.
    pub send_timeout_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".into(),
            port: 8000,
            notification_interval_secs: DEFAULT_NOTIFICATION_INTERVAL.as_secs(),
            drain_timeout_secs: DEFAULT_DRAIN_TIMEOUT.as_secs(),
            shutdown_timeout_secs: DEFAULT_SHUTDOWN_TIMEOUT.as_secs(),
            send_timeout_secs: DEFAULT_SEND_TIMEOUT.as_secs(),
        }
    }
}

impl ServerConfig {
    /// Load a TOML config file on top of the defaults.
    pub fn from_file(path: &Path) -> BeaconResult<Self> {
        let raw = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&raw)?;
        Ok(config)
    }

    /// Reject values the server cannot run with: every duration must be
    /// positive.
    ///
    /// A shutdown timeout shorter than the drain timeout is allowed; the
    /// outer wait then cuts the drain short.
    pub fn validate(&self) -> BeaconResult<()> {
        let durations = [
            ("notification_interval_secs", self.notification_interval_secs),
            ("drain_timeout_secs", self.drain_timeout_secs),
            ("shutdown_timeout_secs", self.shutdown_timeout_secs),
            ("send_timeout_secs", self.send_timeout_secs),
        ];
        for (name, secs) in durations {
            if secs == 0 {
                return Err(BeaconError::config(format!("{name} must be positive")));
            }
        }
        Ok(())
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn notification_interval(&self) -> Duration {
        Duration::from_secs(self.notification_interval_secs)
    }

    pub fn drain_timeout(&self) -> Duration {
        Duration::from_secs(self.drain_timeout_secs)
    }

    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_secs(self.shutdown_timeout_secs)
    }

    pub fn send_timeout(&self) -> Duration {
        Duration::from_secs(self.send_timeout_secs)
    }
}
