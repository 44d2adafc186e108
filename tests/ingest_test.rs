//! Integration tests for feed ingestion: sequencing, log bounds, routing,
//! and active dispatch detection.

use std::sync::Arc;

use chrono::{Duration as ChronoDuration, Utc};
use peace_live::event::{Event, EventKind};
use peace_live::stream::ingest::Ingestor;
use peace_live::stream::invalidation::route;
use peace_live::stream::{
    CacheView, Invalidation, SeqCheck, active_dispatch, find_active_dispatch, format_elapsed,
};
use serde_json::json;

fn payload(kind: &str, seq: u64) -> String {
    json!({
        "type": kind,
        "ts": "2025-03-01T12:00:00Z",
        "seq": seq,
        "step": 3,
        "state": "EXECUTE_TASKS",
    })
    .to_string()
}

fn event(kind: &str, seq: u64) -> Event {
    Event::from_json(&payload(kind, seq)).unwrap()
}

// ---------------------------------------------------------------------------
// Sequencing and the bounded log
// ---------------------------------------------------------------------------

#[test]
fn gapless_feed_never_raises_a_gap_and_log_keeps_newest() {
    let mut ingestor = Ingestor::new(5);

    for seq in 1..=12 {
        let ingested = ingestor.ingest(&payload("dispatch_start", seq)).unwrap();
        assert_eq!(ingested.check, SeqCheck::Continuous);
        assert_eq!(ingested.invalidation, None);
    }

    let seqs: Vec<u64> = ingestor.log().snapshot().iter().map(|e| e.seq).collect();
    assert_eq!(seqs, vec![8, 9, 10, 11, 12]);
    assert_eq!(ingestor.last_seq(), 12);
}

#[test]
fn skipped_sequence_forces_exactly_one_full_resync() {
    let mut ingestor = Ingestor::new(200);
    ingestor.ingest(&payload("dispatch_start", 1)).unwrap();
    ingestor.ingest(&payload("dispatch_end", 2)).unwrap();

    let gap = ingestor.ingest(&payload("dispatch_start", 4)).unwrap();
    assert_eq!(
        gap.check,
        SeqCheck::GapDetected {
            expected: 3,
            received: 4
        }
    );
    assert_eq!(gap.invalidation, Some(Invalidation::All));

    let next = ingestor.ingest(&payload("dispatch_end", 5)).unwrap();
    assert_eq!(next.check, SeqCheck::Continuous);
    assert_eq!(next.invalidation, None);
}

#[test]
fn first_event_of_a_session_is_never_a_gap() {
    let mut ingestor = Ingestor::new(200);
    let first = ingestor.ingest(&payload("dispatch_start", 500)).unwrap();

    assert_eq!(first.check, SeqCheck::Continuous);
    assert_eq!(first.invalidation, None);
}

#[test]
fn regression_resyncs_but_duplicate_does_not() {
    let mut ingestor = Ingestor::new(200);
    ingestor.ingest(&payload("run_start", 10)).unwrap();

    let duplicate = ingestor.ingest(&payload("run_start", 10)).unwrap();
    assert_eq!(duplicate.check, SeqCheck::Duplicate);
    assert_eq!(duplicate.invalidation, None);

    let regressed = ingestor.ingest(&payload("run_start", 1)).unwrap();
    assert!(regressed.check.requires_resync());
    assert_eq!(regressed.invalidation, Some(Invalidation::All));
    assert_eq!(ingestor.last_seq(), 1);
}

#[test]
fn malformed_payloads_are_dropped_without_touching_state() {
    let mut ingestor = Ingestor::new(200);
    ingestor.ingest(&payload("step_start", 1)).unwrap();

    assert!(ingestor.ingest("not json").is_none());
    assert!(ingestor.ingest(r#"{"type":"step_start"}"#).is_none());
    assert!(ingestor.ingest(r#"{"seq":2}"#).is_none());

    assert_eq!(ingestor.last_seq(), 1);
    assert_eq!(ingestor.log().len(), 1);

    let next = ingestor.ingest(&payload("step_start", 2)).unwrap();
    assert_eq!(next.check, SeqCheck::Continuous);
}

#[test]
fn unknown_kinds_are_logged_but_invalidate_nothing() {
    let mut ingestor = Ingestor::new(200);
    let ingested = ingestor.ingest(&payload("heartbeat", 1)).unwrap();

    assert_eq!(ingested.event.kind, EventKind::Other("heartbeat".to_string()));
    assert_eq!(ingested.invalidation, None);
    assert_eq!(ingestor.log().len(), 1);
}

// ---------------------------------------------------------------------------
// Invalidation routing
// ---------------------------------------------------------------------------

#[test]
fn progress_events_invalidate_every_view() {
    for kind in ["state_transition", "step_start", "step_complete"] {
        let mut ingestor = Ingestor::new(10);
        let ingested = ingestor.ingest(&payload(kind, 1)).unwrap();
        let invalidation = ingested.invalidation.unwrap();

        assert_eq!(invalidation.scope(), "selective");
        for view in CacheView::ALL {
            assert!(invalidation.covers(view), "{kind} should cover {view:?}");
        }
    }
}

#[test]
fn pr_status_invalidates_only_steps() {
    let mut ingestor = Ingestor::new(10);
    let invalidation = ingestor
        .ingest(&payload("pr_status", 1))
        .unwrap()
        .invalidation
        .unwrap();

    assert!(invalidation.covers(CacheView::Steps));
    assert!(!invalidation.covers(CacheView::LiveSnapshot));
    assert!(!invalidation.covers(CacheView::Runs));
}

#[test]
fn display_only_kinds_route_nowhere() {
    for kind in EventKind::KNOWN {
        let expected_empty = !matches!(
            kind,
            EventKind::StateTransition
                | EventKind::StepStart
                | EventKind::StepComplete
                | EventKind::PrStatus
        );
        assert_eq!(route(&kind).is_empty(), expected_empty, "{kind}");
    }
}

// ---------------------------------------------------------------------------
// Active dispatch
// ---------------------------------------------------------------------------

#[test]
fn open_dispatch_start_is_active() {
    let events = vec![
        event("step_start", 1),
        event("dispatch_start", 2),
        event("state_transition", 3),
    ];

    let active = find_active_dispatch(&events).unwrap();
    assert_eq!(active.seq, 2);
}

#[test]
fn closed_dispatch_is_not_active() {
    let events = vec![
        event("dispatch_start", 1),
        event("state_transition", 2),
        event("dispatch_end", 3),
    ];

    assert!(find_active_dispatch(&events).is_none());
}

#[test]
fn newest_start_after_an_end_is_active() {
    let events = vec![
        event("dispatch_start", 1),
        event("dispatch_end", 2),
        event("dispatch_start", 3),
    ];

    assert_eq!(find_active_dispatch(&events).unwrap().seq, 3);
}

#[test]
fn empty_log_has_no_active_dispatch() {
    let events: Vec<Arc<Event>> = Vec::new();
    assert!(find_active_dispatch(&events).is_none());
}

#[test]
fn active_dispatch_reports_skill_model_and_elapsed() {
    let started = Utc::now() - ChronoDuration::seconds(185);
    let raw = json!({
        "type": "dispatch_start",
        "ts": started.to_rfc3339(),
        "seq": 7,
        "step": 2,
        "state": "EXECUTE_TASKS",
        "skill": "execute-task",
        "model": "opus",
    })
    .to_string();
    let events = vec![Arc::new(Event::from_json(&raw).unwrap())];

    let dispatch = active_dispatch(&events).unwrap();
    assert_eq!(dispatch.skill().as_deref(), Some("execute-task"));
    assert_eq!(dispatch.model().as_deref(), Some("opus"));

    let elapsed = dispatch.elapsed(Utc::now()).as_secs();
    assert!((185..=187).contains(&elapsed), "elapsed was {elapsed}");
}

#[test]
fn elapsed_is_zero_for_unparseable_or_future_start() {
    let mut start = event("dispatch_start", 1);
    start.ts = "yesterday-ish".to_string();
    let dispatch = active_dispatch(&[start]).unwrap();
    assert_eq!(dispatch.elapsed(Utc::now()).as_secs(), 0);

    let mut future = event("dispatch_start", 2);
    future.ts = (Utc::now() + ChronoDuration::seconds(60)).to_rfc3339();
    let dispatch = active_dispatch(&[future]).unwrap();
    assert_eq!(dispatch.elapsed(Utc::now()).as_secs(), 0);
}

#[test]
fn elapsed_formatting() {
    assert_eq!(format_elapsed(0), "0s");
    assert_eq!(format_elapsed(42), "42s");
    assert_eq!(format_elapsed(60), "1m 0s");
    assert_eq!(format_elapsed(185), "3m 5s");
}
