//! Live session: one reconnecting subscription to the push feed.
//!
//! The session runs a single tokio task that connects, pumps payloads
//! through the [`Ingestor`], and publishes immutable [`LiveState`]
//! snapshots plus [`Invalidation`] signals. Transport failures never end
//! the task; they only show up as [`ConnectionStatus::Disconnected`]
//! until the next attempt.

use std::ops::ControlFlow;
use std::sync::Arc;
use std::time::Duration;

use futures_util::StreamExt;
use serde::Serialize;
use tokio::sync::{Notify, broadcast, watch};
use tokio::task::JoinHandle;
use tracing::{Instrument, Span, debug, info, warn};
use uuid::Uuid;

use super::backoff::{DEFAULT_DELAYS, ReconnectBackoff};
use super::dispatch::{ActiveDispatch, active_dispatch};
use super::feed::{EventFeed, FeedStream};
use super::ingest::Ingestor;
use super::invalidation::Invalidation;
use super::log::DEFAULT_CAPACITY;
use crate::event::Event;
use crate::model::LiveSnapshot;
use crate::telemetry::metrics;
use crate::telemetry::spans::{record_status_change, start_session_span};

/// Connection status as seen by the display layer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionStatus {
    Connecting,
    Connected,
    #[default]
    Disconnected,
}

impl std::fmt::Display for ConnectionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ConnectionStatus::Connecting => "connecting",
            ConnectionStatus::Connected => "connected",
            ConnectionStatus::Disconnected => "disconnected",
        };
        write!(f, "{s}")
    }
}

/// Reconciled view of the feed at one point in time.
#[derive(Debug, Clone, Default)]
pub struct LiveState {
    pub status: ConnectionStatus,
    pub last_event: Option<Arc<Event>>,
    /// Bounded event log, oldest first.
    pub events: Vec<Arc<Event>>,
    /// Last sequence number processed.
    pub last_seq: u64,
}

impl LiveState {
    pub fn active_dispatch(&self) -> Option<ActiveDispatch> {
        active_dispatch(&self.events)
    }

    /// Current pipeline state: the latest event wins over the fetched snapshot.
    pub fn current_state(&self, snapshot: Option<&LiveSnapshot>) -> Option<String> {
        match self.last_event {
            Some(ref event) => Some(event.state.clone()),
            None => snapshot.and_then(|s| s.current_state.clone()),
        }
    }

    /// Events that arrived after `seen`, oldest first.
    ///
    /// Matches by identity rather than `seq`, so a restarted counter never
    /// hides new events or replays old ones. When `seen` is `None` or has
    /// already been evicted, the whole log is new.
    pub fn events_since(&self, seen: Option<&Arc<Event>>) -> &[Arc<Event>] {
        let start = seen
            .and_then(|seen| {
                self.events
                    .iter()
                    .rposition(|event| Arc::ptr_eq(event, seen))
            })
            .map_or(0, |index| index + 1);
        &self.events[start..]
    }

    /// Current step number, preferring the latest event.
    pub fn current_step(&self, snapshot: Option<&LiveSnapshot>) -> Option<i64> {
        self.last_event
            .as_ref()
            .and_then(|event| event.step)
            .or_else(|| snapshot.and_then(|s| s.step_number))
    }
}

/// Tuning for a live session.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Number of events retained in the log.
    pub event_log_capacity: usize,
    /// Reconnect delays indexed by consecutive failures.
    pub reconnect_delays: Vec<Duration>,
    /// Invalidation signals buffered per subscriber before it lags.
    pub invalidation_buffer: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            event_log_capacity: DEFAULT_CAPACITY,
            reconnect_delays: DEFAULT_DELAYS.to_vec(),
            invalidation_buffer: 64,
        }
    }
}

/// Handle to a running live session.
///
/// Dropping the handle aborts the session task, including any pending
/// reconnect timer. Use [`LiveSession::close`] to stop it and wait.
pub struct LiveSession {
    id: Uuid,
    state: watch::Receiver<Arc<LiveState>>,
    invalidations: broadcast::Sender<Invalidation>,
    shutdown: Arc<Notify>,
    task: Option<JoinHandle<()>>,
}

impl LiveSession {
    /// Spawn the session task. Must be called within a tokio runtime.
    pub fn start(feed: Arc<dyn EventFeed>, config: SessionConfig) -> Self {
        let id = Uuid::new_v4();
        let (state_tx, state_rx) = watch::channel(Arc::new(LiveState::default()));
        let (invalidation_tx, _) = broadcast::channel(config.invalidation_buffer.max(1));
        let shutdown = Arc::new(Notify::new());
        let span = start_session_span(&id);

        let worker = SessionWorker {
            feed,
            ingestor: Ingestor::new(config.event_log_capacity),
            backoff: ReconnectBackoff::new(config.reconnect_delays),
            status: ConnectionStatus::Disconnected,
            state_tx,
            invalidation_tx: invalidation_tx.clone(),
            shutdown: Arc::clone(&shutdown),
            span: span.clone(),
        };
        let task = tokio::spawn(worker.run().instrument(span));

        Self {
            id,
            state: state_rx,
            invalidations: invalidation_tx,
            shutdown,
            task: Some(task),
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    /// The latest published state.
    pub fn state(&self) -> Arc<LiveState> {
        Arc::clone(&self.state.borrow())
    }

    /// Observe state changes.
    pub fn watch(&self) -> watch::Receiver<Arc<LiveState>> {
        self.state.clone()
    }

    /// Subscribe to invalidation signals emitted from now on.
    pub fn invalidations(&self) -> broadcast::Receiver<Invalidation> {
        self.invalidations.subscribe()
    }

    /// Stop the session and wait for its task to finish.
    pub async fn close(mut self) {
        self.shutdown.notify_one();
        if let Some(task) = self.task.take() {
            let _ = task.await;
        }
    }
}

impl Drop for LiveSession {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

struct SessionWorker {
    feed: Arc<dyn EventFeed>,
    ingestor: Ingestor,
    backoff: ReconnectBackoff,
    status: ConnectionStatus,
    state_tx: watch::Sender<Arc<LiveState>>,
    invalidation_tx: broadcast::Sender<Invalidation>,
    shutdown: Arc<Notify>,
    span: Span,
}

impl SessionWorker {
    async fn run(mut self) {
        loop {
            self.set_status(ConnectionStatus::Connecting);
            let last_seq = self.ingestor.last_seq();
            self.span.record("feed.last_seq", last_seq);

            let connected = tokio::select! {
                _ = self.shutdown.notified() => break,
                result = self.feed.connect(last_seq) => result,
            };

            match connected {
                Ok(stream) => {
                    self.backoff.reset();
                    self.set_status(ConnectionStatus::Connected);
                    info!(last_seq, "subscribed to live feed");
                    if self.pump(stream).await.is_break() {
                        break;
                    }
                }
                Err(e) => warn!(last_seq, error = %e, "live feed connect failed"),
            }

            self.set_status(ConnectionStatus::Disconnected);
            let delay = self.backoff.next_delay();
            debug!(
                delay_ms = delay.as_millis() as u64,
                failures = self.backoff.consecutive_failures(),
                "scheduling reconnect"
            );

            tokio::select! {
                _ = self.shutdown.notified() => break,
                _ = tokio::time::sleep(delay) => {}
            }
            metrics::reconnects().add(1, &[]);
        }

        self.set_status(ConnectionStatus::Disconnected);
        debug!("live session stopped");
    }

    /// Drain one subscription. Breaks only on shutdown.
    async fn pump(&mut self, mut stream: FeedStream) -> ControlFlow<()> {
        loop {
            let next = tokio::select! {
                _ = self.shutdown.notified() => return ControlFlow::Break(()),
                next = stream.next() => next,
            };
            match next {
                Some(Ok(raw)) => self.handle(&raw),
                Some(Err(e)) => {
                    warn!(error = %e, "live feed dropped");
                    return ControlFlow::Continue(());
                }
                None => {
                    warn!("live feed closed by server");
                    return ControlFlow::Continue(());
                }
            }
        }
    }

    fn handle(&mut self, raw: &str) {
        let Some(ingested) = self.ingestor.ingest(raw) else {
            return;
        };
        self.publish();
        if let Some(invalidation) = ingested.invalidation {
            // No subscribers is fine; nobody is displaying cached views.
            let _ = self.invalidation_tx.send(invalidation);
        }
    }

    fn set_status(&mut self, status: ConnectionStatus) {
        if self.status == status {
            return;
        }
        record_status_change(&self.span, &self.status.to_string(), &status.to_string());
        self.status = status;
        self.publish();
    }

    fn publish(&self) {
        let log = self.ingestor.log();
        self.state_tx.send_replace(Arc::new(LiveState {
            status: self.status,
            last_event: log.last().cloned(),
            events: log.snapshot(),
            last_seq: self.ingestor.last_seq(),
        }));
    }
}
