//! Live client connections and the transport seams they sit on.
//!
//! A [`Connection`] is identified by its `Arc` allocation: two handles are
//! the same connection only when [`Arc::ptr_eq`] holds. The transport layer
//! supplies the actual socket through the [`Outbound`] and [`Inbound`] traits.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use chrono::{DateTime, Local};

use crate::error::BeaconResult;

/// Close code sent to clients when the server shuts down ("going away").
pub const SHUTDOWN_CLOSE_CODE: u16 = 1001;

/// Close reason sent alongside [`SHUTDOWN_CLOSE_CODE`].
pub const SHUTDOWN_CLOSE_REASON: &str = "Server shutting down";

/// Close code sent to a client dropped after a failed or timed-out send
/// ("policy violation").
pub const EVICTED_CLOSE_CODE: u16 = 1008;

/// Close reason sent alongside [`EVICTED_CLOSE_CODE`].
pub const EVICTED_CLOSE_REASON: &str = "Client too slow";

/// Write half of a client channel.
#[async_trait]
pub trait Outbound: Send + Sync {
    /// Send one text frame. Fails with `BeaconError::Transmit`.
    async fn send_text(&self, text: &str) -> BeaconResult<()>;

    /// Send a close frame with the given code and reason.
    async fn close(&self, code: u16, reason: &str) -> BeaconResult<()>;
}

/// Read half of a client channel.
#[async_trait]
pub trait Inbound: Send {
    /// Wait for the next text frame.
    ///
    /// Returns `BeaconError::Disconnected` when the client closes the
    /// channel, `BeaconError::Receive` on any other transport failure.
    async fn receive_text(&mut self) -> BeaconResult<String>;
}

/// One live bidirectional channel to a client.
pub struct Connection {
    peer: String,
    outbound: Box<dyn Outbound>,
    connected_at: DateTime<Local>,
    opened: Instant,
    evicted: AtomicBool,
}

impl Connection {
    /// Wrap an accepted channel. `peer` is only used in logs.
    pub fn new(peer: impl Into<String>, outbound: impl Outbound + 'static) -> Arc<Self> {
        Arc::new(Self {
            peer: peer.into(),
            outbound: Box::new(outbound),
            connected_at: Local::now(),
            opened: Instant::now(),
            evicted: AtomicBool::new(false),
        })
    }

    pub fn peer(&self) -> &str {
        &self.peer
    }

    /// Wall-clock time the connection was accepted.
    pub fn connected_at(&self) -> DateTime<Local> {
        self.connected_at
    }

    /// Connection age.
    pub fn age(&self) -> Duration {
        self.opened.elapsed()
    }

    /// Send a text message to the client.
    pub async fn send_text(&self, text: &str) -> BeaconResult<()> {
        self.outbound.send_text(text).await
    }

    /// Close the channel with a status code and reason.
    pub async fn close(&self, code: u16, reason: &str) -> BeaconResult<()> {
        self.outbound.close(code, reason).await
    }

    /// Whether the registry dropped this connection on someone else's behalf
    /// (failed broadcast or forced shutdown close).
    pub fn is_evicted(&self) -> bool {
        self.evicted.load(Ordering::Acquire)
    }

    pub(crate) fn mark_evicted(&self) {
        self.evicted.store(true, Ordering::Release);
    }
}

impl fmt::Debug for Connection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Connection")
            .field("peer", &self.peer)
            .field("connected_at", &self.connected_at)
            .field("evicted", &self.is_evicted())
            .finish_non_exhaustive()
    }
}
