//! Span helpers for live sessions and step reconciliation.

use tracing::Span;
use uuid::Uuid;

use crate::model::StepRef;

/// Span covering the whole lifetime of one live session.
///
/// `feed.last_seq` is declared empty and updated on every reconnect.
pub fn start_session_span(session_id: &Uuid) -> Span {
    tracing::info_span!(
        "live.session",
        "session.id" = %session_id,
        "feed.last_seq" = tracing::field::Empty,
    )
}

/// Record a connection status change on the session span.
pub fn record_status_change(span: &Span, from: &str, to: &str) {
    span.in_scope(|| {
        tracing::info!(from = from, to = to, "connection_status");
    });
}

/// Span covering a step reconciler task.
pub fn start_reconcile_span(step: &StepRef) -> Span {
    tracing::info_span!(
        "live.reconcile",
        "step.run_id" = step.run_id,
        "step.number" = step.step_number,
    )
}
