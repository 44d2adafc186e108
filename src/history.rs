//! Historical record fetch.
//!
//! The backend is the authoritative baseline: after any invalidation,
//! views are rebuilt from what this interface returns.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::de::DeserializeOwned;

use crate::error::Result;
use crate::model::{FeedStatus, LiveSnapshot, StepHistory, StepRef};

#[async_trait]
pub trait HistorySource: Send + Sync {
    /// Transitions and arbiter events recorded for one step.
    async fn step_history(&self, step: StepRef) -> Result<StepHistory>;

    /// The run's current position, or `None` when no run is active.
    async fn live_snapshot(&self) -> Result<Option<LiveSnapshot>>;
}

/// JSON-over-HTTP client for the dashboard backend.
pub struct HttpHistory {
    client: reqwest::Client,
    base_url: String,
}

impl HttpHistory {
    pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

    pub fn new(base_url: &str) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Self::REQUEST_TIMEOUT)
            .build()?;
        Ok(Self::with_client(client, base_url))
    }

    pub fn with_client(client: reqwest::Client, base_url: &str) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    /// Server-side feed diagnostics.
    pub async fn feed_status(&self) -> Result<FeedStatus> {
        self.get_json("/api/live/status").await
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        let response = self
            .client
            .get(format!("{}{path}", self.base_url))
            .send()
            .await?
            .error_for_status()?;
        Ok(response.json().await?)
    }
}

#[async_trait]
impl HistorySource for HttpHistory {
    async fn step_history(&self, step: StepRef) -> Result<StepHistory> {
        self.get_json(&format!(
            "/api/runs/{}/steps/{}",
            step.run_id, step.step_number
        ))
        .await
    }

    async fn live_snapshot(&self) -> Result<Option<LiveSnapshot>> {
        let response = self
            .client
            .get(format!("{}/api/live/snapshot", self.base_url))
            .send()
            .await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        Ok(Some(response.error_for_status()?.json().await?))
    }
}
