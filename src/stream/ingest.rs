//! Per-message ingestion: decode, sequence check, append, route.

use std::sync::Arc;

use opentelemetry::KeyValue;
use tracing::{debug, warn};

use super::invalidation::{Invalidation, invalidation_for};
use super::log::EventLog;
use super::sequence::{SeqCheck, SequenceTracker};
use crate::event::Event;
use crate::telemetry::metrics;

/// Result of ingesting one well-formed payload.
#[derive(Debug, Clone)]
pub struct Ingested {
    pub event: Arc<Event>,
    pub check: SeqCheck,
    pub invalidation: Option<Invalidation>,
}

/// Owns the sequence tracker and the event log for one session.
#[derive(Debug, Clone)]
pub struct Ingestor {
    tracker: SequenceTracker,
    log: EventLog,
}

impl Ingestor {
    pub fn new(capacity: usize) -> Self {
        Self {
            tracker: SequenceTracker::new(),
            log: EventLog::with_capacity(capacity),
        }
    }

    /// Last sequence number processed; the replay point for a reconnect.
    pub fn last_seq(&self) -> u64 {
        self.tracker.last_seq()
    }

    pub fn log(&self) -> &EventLog {
        &self.log
    }

    /// Process one raw feed payload.
    ///
    /// Returns `None` for payloads that fail to decode; those leave the
    /// sequence tracker and the log untouched.
    pub fn ingest(&mut self, raw: &str) -> Option<Ingested> {
        let event = match Event::from_json(raw) {
            Ok(event) => Arc::new(event),
            Err(e) => {
                debug!(error = %e, payload = %truncate(raw, 100), "dropping malformed event");
                metrics::events_malformed().add(1, &[]);
                return None;
            }
        };

        let check = self.tracker.observe(event.seq);
        match check {
            SeqCheck::GapDetected { expected, received } => {
                warn!(expected, received, "sequence gap, resyncing all views");
                metrics::sequence_breaks().add(1, &[KeyValue::new("reason", "gap")]);
            }
            SeqCheck::Regressed { previous, received } => {
                warn!(previous, received, "sequence regressed, resyncing all views");
                metrics::sequence_breaks().add(1, &[KeyValue::new("reason", "regression")]);
            }
            SeqCheck::Duplicate | SeqCheck::Continuous => {}
        }

        self.log.append(Arc::clone(&event));
        metrics::events_received().add(1, &[KeyValue::new("kind", event.kind.to_string())]);

        let invalidation = invalidation_for(&event.kind, check);
        if let Some(ref inv) = invalidation {
            metrics::invalidations().add(1, &[KeyValue::new("scope", inv.scope())]);
        }

        Some(Ingested {
            event,
            check,
            invalidation,
        })
    }
}

fn truncate(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}
