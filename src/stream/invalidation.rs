//! Cache invalidation routing.
//!
//! The transport knows event kinds; the display layer knows data views.
//! This table is the only place the two meet.

use std::collections::BTreeSet;

use serde::Serialize;

use super::sequence::SeqCheck;
use crate::event::EventKind;

/// A downstream data view that can go stale.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CacheView {
    LiveSnapshot,
    Steps,
    Stats,
    Runs,
}

impl CacheView {
    pub const ALL: [CacheView; 4] = [
        CacheView::LiveSnapshot,
        CacheView::Steps,
        CacheView::Stats,
        CacheView::Runs,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            CacheView::LiveSnapshot => "live_snapshot",
            CacheView::Steps => "steps",
            CacheView::Stats => "stats",
            CacheView::Runs => "runs",
        }
    }
}

/// A refresh signal for downstream views.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Invalidation {
    /// Everything is stale; refetch from the authoritative baseline.
    All,
    /// Only these views are stale.
    Views(BTreeSet<CacheView>),
}

impl Invalidation {
    pub fn covers(&self, view: CacheView) -> bool {
        match self {
            Invalidation::All => true,
            Invalidation::Views(views) => views.contains(&view),
        }
    }

    /// Label used in logs and metrics.
    pub fn scope(&self) -> &'static str {
        match self {
            Invalidation::All => "all",
            Invalidation::Views(_) => "selective",
        }
    }
}

/// Views made stale by an event of this kind.
pub fn route(kind: &EventKind) -> &'static [CacheView] {
    match kind {
        EventKind::StateTransition | EventKind::StepStart | EventKind::StepComplete => &[
            CacheView::LiveSnapshot,
            CacheView::Steps,
            CacheView::Stats,
            CacheView::Runs,
        ],
        EventKind::PrStatus => &[CacheView::Steps],
        EventKind::DispatchStart
        | EventKind::DispatchEnd
        | EventKind::ArbiterVerdict
        | EventKind::Error
        | EventKind::RunStart
        | EventKind::RunStop
        | EventKind::Other(_) => &[],
    }
}

/// The signal to emit for an event, if any.
///
/// A sequence break overrides the kind-specific set.
pub fn invalidation_for(kind: &EventKind, check: SeqCheck) -> Option<Invalidation> {
    if check.requires_resync() {
        return Some(Invalidation::All);
    }
    let views = route(kind);
    if views.is_empty() {
        None
    } else {
        Some(Invalidation::Views(views.iter().copied().collect()))
    }
}
