//! Fan-out of one message to every live connection.

use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use tracing::{debug, error};

use crate::connection::{Connection, EVICTED_CLOSE_CODE, EVICTED_CLOSE_REASON};
use crate::error::BeaconError;
use crate::registry::ConnectionRegistry;

/// Default upper bound for a single client send.
pub const DEFAULT_SEND_TIMEOUT: Duration = Duration::from_secs(10);

/// Outcome of one broadcast call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct BroadcastReport {
    /// Connections in the snapshot.
    pub attempted: usize,
    pub delivered: usize,
    /// Connections whose send failed and that were dropped from the registry.
    pub failed: usize,
}

/// Sends messages to all registered connections, isolating failures.
#[derive(Clone)]
pub struct BroadcastEngine {
    registry: Arc<ConnectionRegistry>,
    send_timeout: Duration,
}

impl BroadcastEngine {
    pub fn new(registry: Arc<ConnectionRegistry>) -> Self {
        Self {
            registry,
            send_timeout: DEFAULT_SEND_TIMEOUT,
        }
    }

    /// Override the per-client send timeout.
    pub fn with_send_timeout(mut self, send_timeout: Duration) -> Self {
        self.send_timeout = send_timeout;
        self
    }

    pub fn registry(&self) -> &Arc<ConnectionRegistry> {
        &self.registry
    }

    /// Send `message` to every live connection.
    ///
    /// Sends run concurrently against a snapshot of the registry. A failed
    /// or timed-out send is logged and the connection is dropped from the
    /// registry once all sends finished, then closed; it never fails the
    /// broadcast.
    pub async fn broadcast(&self, message: &str) -> BroadcastReport {
        if self.registry.is_empty() {
            return BroadcastReport::default();
        }

        let connections = self.registry.snapshot();
        let attempted = connections.len();

        let outcomes = join_all(connections.iter().map(|conn| self.deliver(conn, message))).await;

        let failed: Vec<Arc<Connection>> = connections
            .iter()
            .zip(outcomes)
            .filter(|(_, delivered)| !delivered)
            .map(|(conn, _)| conn.clone())
            .collect();

        if !failed.is_empty() {
            let evicted = self.registry.remove_many(&failed);
            join_all(evicted.iter().map(|conn| self.evict(conn))).await;
        }

        let report = BroadcastReport {
            attempted,
            delivered: attempted - failed.len(),
            failed: failed.len(),
        };
        debug!(
            attempted = report.attempted,
            delivered = report.delivered,
            failed = report.failed,
            "Broadcast finished"
        );
        report
    }

    /// Best-effort close of a connection dropped from the registry, so its
    /// receive loop ends instead of lingering unregistered.
    async fn evict(&self, conn: &Arc<Connection>) {
        let close = conn.close(EVICTED_CLOSE_CODE, EVICTED_CLOSE_REASON);
        match tokio::time::timeout(self.send_timeout, close).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => error!(peer = %conn.peer(), error = %e, "Error closing connection"),
            Err(_) => error!(peer = %conn.peer(), "Timed out closing connection"),
        }
    }

    async fn deliver(&self, conn: &Arc<Connection>, message: &str) -> bool {
        let result = match tokio::time::timeout(self.send_timeout, conn.send_text(message)).await {
            Ok(result) => result,
            Err(_) => Err(BeaconError::transmit(format!(
                "send timed out after {:?}",
                self.send_timeout
            ))),
        };

        match result {
            Ok(()) => true,
            Err(e) => {
                error!(peer = %conn.peer(), error = %e, "Failed to send message");
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connection::fakes::Probe;

    fn engine() -> BroadcastEngine {
        BroadcastEngine::new(Arc::new(ConnectionRegistry::new()))
    }

    #[tokio::test]
    async fn empty_registry_sends_nothing() {
        let engine = engine();
        let report = engine.broadcast("hello").await;
        assert_eq!(report, BroadcastReport::default());
    }

    #[tokio::test]
    async fn every_healthy_client_receives() {
        let engine = engine();
        let probes: Vec<_> = (0..4).map(|_| Probe::new()).collect();
        for (i, probe) in probes.iter().enumerate() {
            engine.registry().add(probe.connection(&format!("c{i}")));
        }

        let report = engine.broadcast("hello").await;
        assert_eq!(report.attempted, 4);
        assert_eq!(report.delivered, 4);
        for probe in &probes {
            assert_eq!(probe.sent(), vec!["hello".to_string()]);
        }
    }

    #[tokio::test]
    async fn failures_are_isolated_and_removed() {
        let engine = engine();
        let healthy: Vec<_> = (0..5).map(|_| Probe::new()).collect();
        let broken: Vec<_> = (0..2).map(|_| Probe::failing()).collect();
        let mut broken_conns = Vec::new();
        for (i, probe) in healthy.iter().enumerate() {
            engine.registry().add(probe.connection(&format!("ok{i}")));
        }
        for (i, probe) in broken.iter().enumerate() {
            let conn = probe.connection(&format!("bad{i}"));
            broken_conns.push(conn.clone());
            engine.registry().add(conn);
        }

        let report = engine.broadcast("tick").await;

        assert_eq!(report.attempted, 7);
        assert_eq!(report.delivered, 5);
        assert_eq!(report.failed, 2);
        assert_eq!(engine.registry().count(), 5);
        for probe in &healthy {
            assert_eq!(probe.sent(), vec!["tick".to_string()]);
        }
        for conn in &broken_conns {
            assert!(conn.is_evicted());
        }
    }

    #[tokio::test]
    async fn all_sends_failing_still_returns() {
        let engine = engine();
        for i in 0..3 {
            engine.registry().add(Probe::failing().connection(&format!("bad{i}")));
        }
        let report = engine.broadcast("tick").await;
        assert_eq!(report.failed, 3);
        assert!(engine.registry().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn stalled_client_times_out_without_blocking_others() {
        let engine = engine().with_send_timeout(Duration::from_secs(2));
        let stalled = Probe::stalled();
        let healthy = Probe::new();
        engine.registry().add(stalled.connection("stalled"));
        engine.registry().add(healthy.connection("healthy"));

        let report = engine.broadcast("tick").await;

        assert_eq!(report.delivered, 1);
        assert_eq!(report.failed, 1);
        assert_eq!(healthy.sent(), vec!["tick".to_string()]);
        assert_eq!(stalled.attempts(), 1);
        assert_eq!(engine.registry().count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn timed_out_client_is_closed() {
        let engine = engine().with_send_timeout(Duration::from_secs(2));
        let stalled = Probe::stalled();
        let conn = stalled.connection("stalled");
        engine.registry().add(conn.clone());

        engine.broadcast("tick").await;

        assert!(engine.registry().is_empty());
        assert!(conn.is_evicted());
        assert_eq!(
            stalled.closes(),
            vec![(EVICTED_CLOSE_CODE, EVICTED_CLOSE_REASON.to_string())]
        );
    }

    #[tokio::test]
    async fn failed_clients_are_closed_healthy_ones_are_not() {
        let engine = engine();
        let healthy = Probe::new();
        let broken = Probe::failing();
        engine.registry().add(healthy.connection("ok"));
        engine.registry().add(broken.connection("bad"));

        let report = engine.broadcast("tick").await;

        assert_eq!(report.failed, 1);
        // The close itself fails on a dead socket; that is only logged.
        assert_eq!(broken.closes().len(), 1);
        assert!(healthy.closes().is_empty());
    }

    #[tokio::test]
    async fn failed_client_already_gone_is_not_an_error() {
        let engine = engine();
        let conn = Probe::failing().connection("leaving");
        engine.registry().add(conn.clone());
        engine.registry().add(Probe::new().connection("staying"));

        let snapshot = engine.registry().snapshot();
        engine.registry().remove(&conn).unwrap();

        // The receive loop already dropped the client; the batch removal
        // after a failed send must skip it.
        assert!(engine.registry().remove_many(&snapshot[..1]).is_empty());
        assert_eq!(engine.registry().count(), 1);
        assert!(!conn.is_evicted());
    }
}
