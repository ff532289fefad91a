//! Beacon Core Library
//!
//! Connection registry, broadcast fan-out, periodic notifications and the
//! graceful shutdown drain behind the Beacon WebSocket server.

pub mod broadcast;
pub mod config;
pub mod connection;
pub mod drain;
pub mod error;
pub mod lifecycle;
pub mod notifier;
pub mod registry;
pub mod session;

pub use broadcast::{BroadcastEngine, BroadcastReport};
pub use config::ServerConfig;
pub use connection::{Connection, Inbound, Outbound};
pub use drain::{DrainCoordinator, DrainOutcome};
pub use error::{BeaconError, BeaconResult};
pub use lifecycle::{Lifecycle, ShutdownReport};
pub use notifier::{NotifierHandle, PeriodicNotifier};
pub use registry::ConnectionRegistry;
