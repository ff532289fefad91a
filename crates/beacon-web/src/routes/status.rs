//! Server status endpoint.

use axum::{extract::State, Json};
use chrono::Local;
use serde::{Deserialize, Serialize};

use crate::state::AppState;

#[derive(Serialize, Deserialize, Debug)]
pub struct StatusResponse {
    pub status: String,
    pub connections: usize,
    pub timestamp: String,
}

/// GET /status - Server status and number of live WebSocket clients.
pub async fn get_status(State(state): State<AppState>) -> Json<StatusResponse> {
    Json(StatusResponse {
        status: "running".to_string(),
        connections: state.registry.count(),
        timestamp: Local::now().format("%Y-%m-%dT%H:%M:%S%.6f").to_string(),
    })
}
