//! Push-feed transport.
//!
//! [`EventFeed`] is the seam between the session and the network. The
//! session only ever asks for "a stream of raw payloads starting after
//! sequence N"; how that stream is produced is the feed's business.

use async_trait::async_trait;
use futures_util::stream::BoxStream;
use reqwest::header::ACCEPT;

use super::sse::sse_payloads;
use crate::error::Result;

/// Raw event payloads from one subscription. An `Err` item or the end of
/// the stream both mean the subscription is gone.
pub type FeedStream = BoxStream<'static, Result<String>>;

#[async_trait]
pub trait EventFeed: Send + Sync {
    /// Open a subscription, asking the server to replay everything after `last_seq`.
    async fn connect(&self, last_seq: u64) -> Result<FeedStream>;
}

/// Server-sent events over HTTP from the dashboard backend.
pub struct HttpEventFeed {
    client: reqwest::Client,
    url: String,
}

impl HttpEventFeed {
    pub fn new(base_url: &str) -> Self {
        Self::with_client(reqwest::Client::new(), base_url)
    }

    /// The client must not carry a total request timeout; the stream is long-lived.
    pub fn with_client(client: reqwest::Client, base_url: &str) -> Self {
        Self {
            client,
            url: format!("{}/api/live/events", base_url.trim_end_matches('/')),
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl EventFeed for HttpEventFeed {
    async fn connect(&self, last_seq: u64) -> Result<FeedStream> {
        let response = self
            .client
            .get(&self.url)
            .query(&[("last_event_id", last_seq)])
            .header(ACCEPT, "text/event-stream")
            .header("Last-Event-ID", last_seq.to_string())
            .send()
            .await?
            .error_for_status()?;

        Ok(sse_payloads(response.bytes_stream()))
    }
}
