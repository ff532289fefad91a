//! Waiting for live connections to go away during shutdown.

use std::sync::{Arc, OnceLock};
use std::time::Duration;

use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::registry::ConnectionRegistry;

/// Default time clients get to disconnect on their own.
pub const DEFAULT_DRAIN_TIMEOUT: Duration = Duration::from_secs(30 * 60);

/// How often the registry is re-checked while draining.
pub const DRAIN_POLL_INTERVAL: Duration = Duration::from_secs(1);

/// How a drain ended. Neither outcome is an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DrainOutcome {
    /// Every client disconnected before the deadline.
    Drained,
    /// The deadline passed and the remaining clients were closed.
    ForcedClose { closed: usize },
}

/// Polls the registry until it is empty or the deadline passes.
pub struct DrainCoordinator {
    registry: Arc<ConnectionRegistry>,
    timeout: Duration,
    poll_interval: Duration,
    started: OnceLock<Instant>,
}

impl DrainCoordinator {
    pub fn new(registry: Arc<ConnectionRegistry>, timeout: Duration) -> Self {
        Self {
            registry,
            timeout,
            poll_interval: DRAIN_POLL_INTERVAL,
            started: OnceLock::new(),
        }
    }

    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Time since the first call to [`wait_for_drain_or_timeout`](Self::wait_for_drain_or_timeout).
    pub fn elapsed(&self) -> Option<Duration> {
        self.started.get().map(|start| start.elapsed())
    }

    /// Wait until every connection is gone, closing stragglers at the deadline.
    ///
    /// The start instant is recorded on the first call only, so calling this
    /// again after an interrupted wait keeps the original deadline.
    pub async fn wait_for_drain_or_timeout(&self) -> DrainOutcome {
        let start = *self.started.get_or_init(Instant::now);
        info!(timeout_secs = self.timeout.as_secs(), "Graceful shutdown initiated");

        loop {
            let count = self.registry.count();
            let elapsed = start.elapsed();

            if count == 0 {
                info!("All connections closed. Proceeding with shutdown");
                return DrainOutcome::Drained;
            }

            if elapsed >= self.timeout {
                warn!(active = count, "Timeout reached. Force closing connections");
                let closed = self.registry.close_all().await;
                return DrainOutcome::ForcedClose { closed };
            }

            debug!(
                active = count,
                remaining_secs = (self.timeout - elapsed).as_secs(),
                "Waiting for connections to close"
            );
            tokio::time::sleep(self.poll_interval).await;
        }
    }
}
