//! Application state.

use std::sync::Arc;

use beacon_core::{BroadcastEngine, BroadcastReport, ConnectionRegistry};

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    pub registry: Arc<ConnectionRegistry>,
    pub engine: BroadcastEngine,
}

impl AppState {
    pub fn new(engine: BroadcastEngine) -> Self {
        Self {
            registry: engine.registry().clone(),
            engine,
        }
    }

    /// Broadcast a message to all WebSocket clients.
    pub async fn broadcast(&self, msg: &str) -> BroadcastReport {
        self.engine.broadcast(msg).await
    }
}
