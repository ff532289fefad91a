//! Receive loop for one registered connection.

use std::sync::Arc;

use chrono::{DateTime, Local};
use tracing::{debug, error, info};

use crate::connection::{Connection, Inbound};
use crate::error::{BeaconError, BeaconResult};
use crate::registry::ConnectionRegistry;

/// Greeting sent to every client right after it is registered, stamped
/// with the time the connection was accepted.
pub fn welcome_message(connected_at: DateTime<Local>) -> String {
    format!("Connected at {}", connected_at.format("%Y-%m-%dT%H:%M:%S%.6f"))
}

/// Drive a registered connection until the client goes away.
///
/// The caller registers `connection` before calling this. Whatever ends the
/// loop, the connection leaves the registry exactly once: if a failed
/// broadcast or a forced shutdown already evicted it, the cleanup skips the
/// removal instead of tripping the registry's double-remove check.
pub async fn run_session<I>(connection: Arc<Connection>, mut inbound: I, registry: &ConnectionRegistry)
where
    I: Inbound,
{
    match receive_loop(&connection, &mut inbound).await {
        Ok(()) => {}
        Err(BeaconError::Disconnected { code, reason }) => {
            info!(
                peer = %connection.peer(),
                code,
                reason = %reason,
                connected_secs = connection.age().as_secs(),
                "Client closed connection"
            );
        }
        Err(e) => {
            error!(peer = %connection.peer(), error = %e, "WebSocket error");
        }
    }

    release(&connection, registry);
}

async fn receive_loop<I: Inbound>(connection: &Connection, inbound: &mut I) -> BeaconResult<()> {
    connection
        .send_text(&welcome_message(connection.connected_at()))
        .await?;
    loop {
        let text = inbound.receive_text().await?;
        info!(peer = %connection.peer(), message = %text, "Message received");
    }
}

fn release(connection: &Arc<Connection>, registry: &ConnectionRegistry) {
    if connection.is_evicted() {
        debug!(peer = %connection.peer(), "Connection already evicted");
        return;
    }
    match registry.remove(connection) {
        Ok(()) => {}
        // Lost a race with a concurrent eviction.
        Err(BeaconError::ConnectionNotFound(_)) if connection.is_evicted() => {
            debug!(peer = %connection.peer(), "Connection already evicted");
        }
        Err(e) => {
            error!(peer = %connection.peer(), error = %e, "Failed to unregister connection");
        }
    }
}
