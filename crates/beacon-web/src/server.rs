//! Listener, router and lifecycle wired into one server.

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use beacon_core::{ConnectionRegistry, Lifecycle, ServerConfig, ShutdownReport};
use tokio::net::TcpListener;
use tracing::info;

use crate::create_router;
use crate::state::AppState;

/// A bound, not yet running Beacon server.
pub struct Server {
    listener: TcpListener,
    lifecycle: Lifecycle,
}

impl Server {
    /// Validate the configuration and bind the listener.
    pub async fn bind(config: ServerConfig) -> Result<Self> {
        config.validate()?;

        let listener = TcpListener::bind(config.bind_addr())
            .await
            .with_context(|| format!("Failed to bind {}", config.bind_addr()))?;

        let registry = Arc::new(ConnectionRegistry::new());
        let lifecycle = Lifecycle::new(registry, &config);

        Ok(Self {
            listener,
            lifecycle,
        })
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    /// Registry shared by every handler of this server.
    pub fn registry(&self) -> Arc<ConnectionRegistry> {
        self.lifecycle.registry().clone()
    }

    /// Serve until `shutdown` resolves, then drain live connections.
    ///
    /// The periodic notifier starts before the first connection is accepted
    /// and is stopped before the drain begins.
    pub async fn run<F>(self, shutdown: F) -> Result<ShutdownReport>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let Self {
            listener,
            mut lifecycle,
        } = self;

        lifecycle.start()?;

        let app = create_router(AppState::new(lifecycle.engine().clone()));
        let serve = axum::serve(
            listener,
            app.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .with_graceful_shutdown(shutdown)
        .await;

        // Drain even when the listener failed, so the notifier never outlives us.
        let report = lifecycle.stop().await;
        serve.context("Web server failed")?;
        Ok(report)
    }
}

/// Resolve on Ctrl+C or, on Unix, SIGTERM.
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received");
}
