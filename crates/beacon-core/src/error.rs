//! Centralized error types for Beacon.

use thiserror::Error;

/// Main error type for Beacon operations.
#[derive(Error, Debug)]
pub enum BeaconError {
    /// `remove` was called for a connection the registry does not hold.
    #[error("Connection not registered: {0}")]
    ConnectionNotFound(String),

    #[error("Transmit failed: {0}")]
    Transmit(String),

    #[error("Client disconnected (code {code}): {reason}")]
    Disconnected { code: u16, reason: String },

    #[error("Receive failed: {0}")]
    Receive(String),

    #[error("Periodic notifier already started")]
    AlreadyStarted,

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Config file error: {0}")]
    Toml(#[from] toml::de::Error),
}

/// Result type for Beacon operations.
pub type BeaconResult<T> = Result<T, BeaconError>;

impl BeaconError {
    /// Create a transmit error.
    pub fn transmit(msg: impl Into<String>) -> Self {
        Self::Transmit(msg.into())
    }

    /// Create a disconnected error.
    pub fn disconnected(code: u16, reason: impl Into<String>) -> Self {
        Self::Disconnected {
            code,
            reason: reason.into(),
        }
    }

    /// Create a configuration error.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }
}
