//! Start/stop wiring for the notifier and the shutdown drain.

use std::sync::Arc;
use std::time::Duration;

use tracing::{error, info, warn};

use crate::broadcast::BroadcastEngine;
use crate::config::ServerConfig;
use crate::drain::{DrainCoordinator, DrainOutcome};
use crate::error::BeaconResult;
use crate::notifier::{NotifierHandle, PeriodicNotifier};
use crate::registry::ConnectionRegistry;

/// Default hard upper bound on the whole shutdown wait.
pub const DEFAULT_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(30 * 60);

/// How [`Lifecycle::stop`] ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownReport {
    /// The drain finished within the shutdown timeout.
    Completed(DrainOutcome),
    /// The shutdown timeout elapsed first; the process exits anyway.
    TimedOut { remaining: usize },
}

/// Owns the background notifier and runs the shutdown sequence.
pub struct Lifecycle {
    registry: Arc<ConnectionRegistry>,
    engine: BroadcastEngine,
    notifier: PeriodicNotifier,
    handle: Option<NotifierHandle>,
    drain: DrainCoordinator,
    shutdown_timeout: Duration,
}

impl Lifecycle {
    pub fn new(registry: Arc<ConnectionRegistry>, config: &ServerConfig) -> Self {
        if config.shutdown_timeout() < config.drain_timeout() {
            warn!(
                drain_timeout_secs = config.drain_timeout_secs,
                shutdown_timeout_secs = config.shutdown_timeout_secs,
                "Shutdown timeout is shorter than drain timeout"
            );
        }
        let engine =
            BroadcastEngine::new(registry.clone()).with_send_timeout(config.send_timeout());
        Self {
            notifier: PeriodicNotifier::new(engine.clone(), config.notification_interval()),
            drain: DrainCoordinator::new(registry.clone(), config.drain_timeout()),
            shutdown_timeout: config.shutdown_timeout(),
            handle: None,
            engine,
            registry,
        }
    }

    pub fn registry(&self) -> &Arc<ConnectionRegistry> {
        &self.registry
    }

    /// Engine shared with the HTTP broadcast trigger.
    pub fn engine(&self) -> &BroadcastEngine {
        &self.engine
    }

    /// Notifications sent by the periodic notifier so far.
    pub fn notification_count(&self) -> u64 {
        self.notifier.count()
    }

    /// Spawn the periodic notifier. Call before accepting connections.
    pub fn start(&mut self) -> BeaconResult<()> {
        info!("Starting Beacon WebSocket server");
        self.handle = Some(self.notifier.start()?);
        Ok(())
    }

    /// Stop the notifier, then drain connections within the shutdown timeout.
    pub async fn stop(&mut self) -> ShutdownReport {
        info!("Shutting down Beacon WebSocket server");

        if let Some(handle) = self.handle.take() {
            handle.cancel().await;
            self.notifier.mark_cancelled();
        }

        info!(
            drain_timeout_secs = self.drain.timeout().as_secs(),
            shutdown_timeout_secs = self.shutdown_timeout.as_secs(),
            connections = self.registry.count(),
            "Draining connections"
        );
        match tokio::time::timeout(self.shutdown_timeout, self.drain.wait_for_drain_or_timeout())
            .await
        {
            Ok(outcome) => {
                info!(connections = self.registry.count(), "Shutdown complete");
                ShutdownReport::Completed(outcome)
            }
            Err(_) => {
                let remaining = self.registry.count();
                error!(connections = remaining, "Shutdown timeout exceeded, forcing exit");
                ShutdownReport::TimedOut { remaining }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connection::fakes::Probe;
    use crate::error::BeaconError;
    use crate::notifier::NotifierState;

    fn config(drain: u64, shutdown: u64) -> ServerConfig {
        ServerConfig {
            notification_interval_secs: 1,
            drain_timeout_secs: drain,
            shutdown_timeout_secs: shutdown,
            ..ServerConfig::default()
        }
    }

    #[tokio::test(start_paused = true)]
    async fn stop_cancels_notifier_and_drains() {
        let registry = Arc::new(ConnectionRegistry::new());
        let probe = Probe::new();
        let conn = probe.connection("c1");
        registry.add(conn.clone());

        let mut lifecycle = Lifecycle::new(registry.clone(), &config(60, 120));
        lifecycle.start().unwrap();
        tokio::time::sleep(Duration::from_millis(3_500)).await;
        assert_eq!(lifecycle.notification_count(), 3);

        let leaving = registry.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(5)).await;
            leaving.remove(&conn).unwrap();
        });

        let report = lifecycle.stop().await;
        assert_eq!(report, ShutdownReport::Completed(DrainOutcome::Drained));
        assert_eq!(lifecycle.notifier.state(), NotifierState::Cancelled);
        // No notifications while draining.
        assert_eq!(probe.sent().len(), 3);
        assert!(probe.closes().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn drain_deadline_forces_close() {
        let registry = Arc::new(ConnectionRegistry::new());
        let probe = Probe::new();
        registry.add(probe.connection("stuck"));

        let mut lifecycle = Lifecycle::new(registry.clone(), &config(5, 60));
        lifecycle.start().unwrap();

        let report = lifecycle.stop().await;
        assert_eq!(
            report,
            ShutdownReport::Completed(DrainOutcome::ForcedClose { closed: 1 })
        );
        assert!(registry.is_empty());
        assert_eq!(probe.closes().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn outer_timeout_wins_over_drain() {
        let registry = Arc::new(ConnectionRegistry::new());
        let probe = Probe::new();
        registry.add(probe.connection("stuck"));

        let mut lifecycle = Lifecycle::new(registry.clone(), &config(600, 5));
        lifecycle.start().unwrap();

        let before = tokio::time::Instant::now();
        let report = lifecycle.stop().await;
        assert_eq!(report, ShutdownReport::TimedOut { remaining: 1 });
        assert!(before.elapsed() < Duration::from_secs(6));
        assert!(probe.closes().is_empty());
    }

    #[tokio::test]
    async fn stop_without_start_is_fine() {
        let registry = Arc::new(ConnectionRegistry::new());
        let mut lifecycle = Lifecycle::new(registry, &config(5, 5));
        let report = lifecycle.stop().await;
        assert_eq!(report, ShutdownReport::Completed(DrainOutcome::Drained));
    }

    #[tokio::test]
    async fn zero_interval_fails_to_start() {
        let registry = Arc::new(ConnectionRegistry::new());
        let cfg = ServerConfig {
            notification_interval_secs: 0,
            ..config(5, 5)
        };
        let mut lifecycle = Lifecycle::new(registry, &cfg);
        assert!(matches!(lifecycle.start(), Err(BeaconError::Config(_))));
        let report = lifecycle.stop().await;
        assert_eq!(report, ShutdownReport::Completed(DrainOutcome::Drained));
    }

    #[tokio::test]
    async fn start_twice_fails() {
        let registry = Arc::new(ConnectionRegistry::new());
        let mut lifecycle = Lifecycle::new(registry, &config(5, 5));
        lifecycle.start().unwrap();
        assert!(matches!(lifecycle.start(), Err(BeaconError::AlreadyStarted)));
        lifecycle.stop().await;
    }
}
