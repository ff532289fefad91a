//! Dashboard route handler.
//!
//! Serves the embedded WebSocket demo client.

use axum::response::{Html, IntoResponse};

const DASHBOARD_HTML: &str = include_str!("../../../../assets/web/index.html");

/// GET / - Serve the demo client.
pub async fn index() -> impl IntoResponse {
    Html(DASHBOARD_HTML)
}
