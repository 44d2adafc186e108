//! Active dispatch detection over the live event log.

use std::borrow::Borrow;
use std::time::Duration;

use chrono::{DateTime, Utc};

use crate::event::{Event, EventKind};

/// Most recent `dispatch_start` not yet closed by a `dispatch_end`.
///
/// Scans newest to oldest. Start and end events are not guaranteed to be
/// adjacent, so the first of either kind decides.
pub fn find_active_dispatch<E: Borrow<Event>>(events: &[E]) -> Option<&E> {
    for event in events.iter().rev() {
        match <E as Borrow<Event>>::borrow(event).kind {
            EventKind::DispatchEnd => return None,
            EventKind::DispatchStart => return Some(event),
            _ => {}
        }
    }
    None
}

/// A dispatch in flight.
#[derive(Debug, Clone, PartialEq)]
pub struct ActiveDispatch {
    pub event: Event,
    pub started_at: Option<DateTime<Utc>>,
}

impl ActiveDispatch {
    pub fn skill(&self) -> Option<String> {
        self.event.text("skill")
    }

    pub fn model(&self) -> Option<String> {
        self.event.text("model")
    }

    /// Whole seconds since the dispatch started, never negative.
    ///
    /// Zero when the start time could not be parsed.
    pub fn elapsed(&self, now: DateTime<Utc>) -> Duration {
        self.started_at
            .and_then(|start| (now - start).to_std().ok())
            .map(|d| Duration::from_secs(d.as_secs()))
            .unwrap_or_default()
    }
}

pub fn active_dispatch<E: Borrow<Event>>(events: &[E]) -> Option<ActiveDispatch> {
    find_active_dispatch(events).map(|event| {
        let event = <E as Borrow<Event>>::borrow(event).clone();
        ActiveDispatch {
            started_at: event.timestamp(),
            event,
        }
    })
}

/// Render elapsed seconds as `42s` or `3m 5s`.
pub fn format_elapsed(secs: u64) -> String {
    let minutes = secs / 60;
    let seconds = secs % 60;
    if minutes > 0 {
        format!("{minutes}m {seconds}s")
    } else {
        format!("{seconds}s")
    }
}
