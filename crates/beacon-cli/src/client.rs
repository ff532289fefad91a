//! HTTP client for a running Beacon server.

use std::time::Duration;

use anyhow::{Context, Result};
use beacon_web::routes::broadcast::BroadcastResponse;
use beacon_web::routes::status::StatusResponse;
use tracing::debug;

/// Talks to the status and broadcast endpoints of a Beacon server.
pub struct BeaconClient {
    client: reqwest::Client,
    base_url: String,
}

impl BeaconClient {
    pub fn new(base_url: &str) -> Self {
        debug!(base_url = %base_url, "BeaconClient initialized");
        Self {
            client: reqwest::Client::builder()
                .timeout(Duration::from_secs(5))
                .build()
                .unwrap_or_default(),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    /// GET /status
    pub async fn status(&self) -> Result<StatusResponse> {
        let url = format!("{}/status", self.base_url);
        debug!(url = %url, "Fetching server status");

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .with_context(|| format!("Failed to reach {} (is `beacon serve` running?)", url))?
            .error_for_status()?;
        Ok(response.json().await?)
    }

    /// POST /broadcast
    pub async fn broadcast(&self, message: &str) -> Result<BroadcastResponse> {
        let url = format!("{}/broadcast", self.base_url);
        debug!(url = %url, "Sending broadcast");

        let response = self
            .client
            .post(&url)
            .query(&[("message", message)])
            .send()
            .await
            .with_context(|| format!("Failed to reach {} (is `beacon serve` running?)", url))?
            .error_for_status()?;
        Ok(response.json().await?)
    }
}
