//! Manual broadcast trigger.

use axum::{
    extract::{Query, State},
    Json,
};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::state::AppState;

#[derive(Deserialize)]
pub struct BroadcastParams {
    pub message: String,
}

#[derive(Serialize, Deserialize, Debug)]
pub struct BroadcastResponse {
    pub status: String,
    pub message: String,
    /// Live connections after the broadcast.
    pub recipients: usize,
}

/// POST /broadcast?message=... - Send a message to every WebSocket client.
pub async fn broadcast_message(
    State(state): State<AppState>,
    Query(params): Query<BroadcastParams>,
) -> Json<BroadcastResponse> {
    let report = state
        .broadcast(&format!("Manual broadcast: {}", params.message))
        .await;
    info!(
        delivered = report.delivered,
        failed = report.failed,
        "Manual broadcast sent"
    );

    Json(BroadcastResponse {
        status: "sent".to_string(),
        message: params.message,
        recipients: state.registry.count(),
    })
}
