//! Registry of live client connections.
//!
//! Every mutation of the live set happens under one lock. The lock is only
//! held for pointer copies; sends and closes always run on a snapshot taken
//! outside of it, so a slow client never stalls the registry.

use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, error, info};

use crate::connection::{Connection, SHUTDOWN_CLOSE_CODE, SHUTDOWN_CLOSE_REASON};
use crate::error::{BeaconError, BeaconResult};

/// Concurrency-safe set of live connections.
#[derive(Default)]
pub struct ConnectionRegistry {
    connections: Mutex<Vec<Arc<Connection>>>,
}

impl ConnectionRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a connection whose handshake already completed.
    pub fn add(&self, connection: Arc<Connection>) {
        let peer = connection.peer().to_string();
        let total = {
            let mut conns = self.connections.lock();
            debug_assert!(
                !conns.iter().any(|c| Arc::ptr_eq(c, &connection)),
                "connection registered twice"
            );
            conns.push(connection);
            conns.len()
        };
        info!(peer = %peer, total, "Client connected");
    }

    /// Unregister a connection.
    ///
    /// Removing a connection that is not registered is a caller bug and
    /// fails with [`BeaconError::ConnectionNotFound`].
    pub fn remove(&self, connection: &Arc<Connection>) -> BeaconResult<()> {
        let total = {
            let mut conns = self.connections.lock();
            let index = conns
                .iter()
                .position(|c| Arc::ptr_eq(c, connection))
                .ok_or_else(|| BeaconError::ConnectionNotFound(connection.peer().to_string()))?;
            conns.swap_remove(index);
            conns.len()
        };
        info!(peer = %connection.peer(), total, "Client disconnected");
        Ok(())
    }

    /// Unregister a batch of connections under a single lock acquisition.
    ///
    /// Connections that are no longer registered are skipped. Every removed
    /// connection is marked evicted. Returns the connections actually
    /// removed, so the caller can close them outside the lock.
    pub fn remove_many(&self, connections: &[Arc<Connection>]) -> Vec<Arc<Connection>> {
        if connections.is_empty() {
            return Vec::new();
        }
        let mut removed = Vec::new();
        let total = {
            let mut conns = self.connections.lock();
            conns.retain(|c| {
                let doomed = connections.iter().any(|d| Arc::ptr_eq(c, d));
                if doomed {
                    c.mark_evicted();
                    removed.push(c.clone());
                }
                !doomed
            });
            conns.len()
        };
        debug!(removed = removed.len(), total, "Removed failed connections");
        removed
    }

    /// Point-in-time copy of the live set, safe to iterate without the lock.
    pub fn snapshot(&self) -> Vec<Arc<Connection>> {
        self.connections.lock().clone()
    }

    /// Number of live connections.
    pub fn count(&self) -> usize {
        self.connections.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.count() == 0
    }

    /// Take every connection out of the registry and close it.
    ///
    /// The live set is cleared atomically first; the closes run outside the
    /// lock and individual close failures are only logged. Returns the
    /// number of connections that were taken.
    pub async fn close_all(&self) -> usize {
        let taken = {
            let mut conns = self.connections.lock();
            let taken = std::mem::take(&mut *conns);
            for conn in &taken {
                conn.mark_evicted();
            }
            taken
        };

        for conn in &taken {
            if let Err(e) = conn.close(SHUTDOWN_CLOSE_CODE, SHUTDOWN_CLOSE_REASON).await {
                error!(peer = %conn.peer(), error = %e, "Error closing connection");
            }
        }
        taken.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connection::fakes::Probe;

    #[test]
    fn add_increments_count() {
        let registry = ConnectionRegistry::new();
        assert_eq!(registry.count(), 0);
        registry.add(Probe::new().connection("c1"));
        registry.add(Probe::new().connection("c2"));
        assert_eq!(registry.count(), 2);
    }

    #[test]
    fn count_is_adds_minus_removes() {
        let registry = ConnectionRegistry::new();
        let conns: Vec<_> = (0..10)
            .map(|i| Probe::new().connection(&format!("c{i}")))
            .collect();
        for conn in &conns {
            registry.add(conn.clone());
        }
        for conn in conns.iter().step_by(3) {
            registry.remove(conn).unwrap();
        }
        // removed c0, c3, c6, c9
        assert_eq!(registry.count(), 6);

        registry.add(Probe::new().connection("late"));
        assert_eq!(registry.count(), 7);
    }

    #[test]
    fn remove_unknown_connection_fails() {
        let registry = ConnectionRegistry::new();
        let conn = Probe::new().connection("stranger");
        let err = registry.remove(&conn).unwrap_err();
        assert!(matches!(err, BeaconError::ConnectionNotFound(peer) if peer == "stranger"));
    }

    #[test]
    fn double_remove_fails() {
        let registry = ConnectionRegistry::new();
        let conn = Probe::new().connection("c1");
        registry.add(conn.clone());
        registry.remove(&conn).unwrap();
        assert!(registry.remove(&conn).is_err());
        assert_eq!(registry.count(), 0);
    }

    #[test]
    fn remove_matches_by_identity_not_peer() {
        let registry = ConnectionRegistry::new();
        let a = Probe::new().connection("same");
        let b = Probe::new().connection("same");
        registry.add(a.clone());
        assert!(registry.remove(&b).is_err());
        registry.remove(&a).unwrap();
    }

    #[test]
    fn snapshot_is_detached_from_live_set() {
        let registry = ConnectionRegistry::new();
        let conn = Probe::new().connection("c1");
        registry.add(conn.clone());

        let snapshot = registry.snapshot();
        registry.remove(&conn).unwrap();
        registry.add(Probe::new().connection("c2"));

        assert_eq!(snapshot.len(), 1);
        assert!(Arc::ptr_eq(&snapshot[0], &conn));
    }

    #[test]
    fn remove_many_skips_missing_and_marks_evicted() {
        let registry = ConnectionRegistry::new();
        let a = Probe::new().connection("a");
        let b = Probe::new().connection("b");
        let gone = Probe::new().connection("gone");
        registry.add(a.clone());
        registry.add(b.clone());

        let removed = registry.remove_many(&[a.clone(), gone.clone()]);
        assert_eq!(removed.len(), 1);
        assert!(Arc::ptr_eq(&removed[0], &a));
        assert_eq!(registry.count(), 1);
        assert!(a.is_evicted());
        assert!(!b.is_evicted());
        assert!(!gone.is_evicted());
    }

    #[tokio::test]
    async fn close_all_clears_and_closes_everyone() {
        let registry = ConnectionRegistry::new();
        let probes: Vec<_> = (0..3).map(|_| Probe::new()).collect();
        for (i, probe) in probes.iter().enumerate() {
            registry.add(probe.connection(&format!("c{i}")));
        }

        let closed = registry.close_all().await;
        assert_eq!(closed, 3);
        assert!(registry.is_empty());
        for probe in &probes {
            assert_eq!(
                probe.closes(),
                vec![(SHUTDOWN_CLOSE_CODE, SHUTDOWN_CLOSE_REASON.to_string())]
            );
        }
    }

    #[tokio::test]
    async fn close_all_survives_close_failures() {
        let registry = ConnectionRegistry::new();
        let broken = Probe::failing();
        let healthy = Probe::new();
        registry.add(broken.connection("broken"));
        registry.add(healthy.connection("healthy"));

        assert_eq!(registry.close_all().await, 2);
        assert!(registry.is_empty());
        assert_eq!(healthy.closes().len(), 1);
    }

    #[tokio::test]
    async fn remove_after_close_all_fails_but_is_flagged() {
        let registry = ConnectionRegistry::new();
        let conn = Probe::new().connection("c1");
        registry.add(conn.clone());
        registry.close_all().await;

        assert!(conn.is_evicted());
        assert!(registry.remove(&conn).is_err());
    }
}
