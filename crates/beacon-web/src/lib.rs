//! Beacon Web Server
//!
//! Axum-based WebSocket fan-out server with status and broadcast endpoints.

pub mod routes;
pub mod server;
pub mod state;
pub mod websocket;

use axum::{
    routing::{get, post},
    Router,
};
use beacon_core::ServerConfig;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

pub use server::{shutdown_signal, Server};
use state::AppState;

/// Create the application router.
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/", get(routes::dashboard::index))
        .route("/status", get(routes::status::get_status))
        .route("/broadcast", post(routes::broadcast::broadcast_message))
        .route("/ws", get(websocket::ws_handler))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

/// Run the web server until Ctrl+C or SIGTERM, then shut down gracefully.
pub async fn run_server(config: ServerConfig) -> anyhow::Result<()> {
    let server = Server::bind(config).await?;
    let addr = server.local_addr()?;
    tracing::info!("Web server listening on http://{}", addr);

    let report = server.run(shutdown_signal()).await?;
    tracing::debug!(?report, "Server stopped");
    Ok(())
}
