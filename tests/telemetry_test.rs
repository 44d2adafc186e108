//! Integration tests for telemetry initialization, span helpers and metrics.

use opentelemetry::KeyValue;
use peace_live::model::StepRef;
use peace_live::telemetry::{TelemetryConfig, init_telemetry, metrics, spans};
use uuid::Uuid;

#[test]
fn telemetry_initializes_without_endpoint() {
    // A global subscriber can only be installed once per process, so a
    // second init from another test may return Err; that is acceptable.
    let config = TelemetryConfig {
        endpoint: None,
        service_name: "peace-live-test".to_string(),
        default_filter: "debug".to_string(),
    };
    if let Ok(guard) = init_telemetry(config) {
        assert!(!guard.is_exporting());
        guard.force_flush();
    }
}

#[test]
fn session_span_records_status_changes() {
    let id = Uuid::new_v4();
    let span = spans::start_session_span(&id);
    span.record("feed.last_seq", 42_u64);
    spans::record_status_change(&span, "connecting", "connected");
}

#[test]
fn reconcile_span_creates() {
    let step = StepRef {
        run_id: 1,
        step_number: 2,
    };
    let _entered = spans::start_reconcile_span(&step).entered();
}

#[test]
fn metric_instruments_are_noops_without_provider() {
    metrics::events_received().add(1, &[KeyValue::new("kind", "step_start")]);
    metrics::events_malformed().add(1, &[]);
    metrics::sequence_breaks().add(1, &[KeyValue::new("reason", "gap")]);
    metrics::reconnects().add(1, &[]);
    metrics::invalidations().add(1, &[KeyValue::new("scope", "all")]);
    metrics::history_fetches().add(
        1,
        &[
            KeyValue::new("resource", "step"),
            KeyValue::new("result", "ok"),
        ],
    );
    metrics::reconstruct_duration_ms().record(0.25, &[]);
}
