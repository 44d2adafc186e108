//! Historical records fetched from the dashboard backend.
//!
//! These mirror the backend's JSON shapes. Every field the backend may
//! omit or null out is optional or defaulted, so a partially-populated
//! record still decodes.

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Step addressing
// ---------------------------------------------------------------------------

/// Addresses one step of one run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StepRef {
    pub run_id: i64,
    pub step_number: i64,
}

impl std::fmt::Display for StepRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "run {} step {}", self.run_id, self.step_number)
    }
}

// ---------------------------------------------------------------------------
// Transition
// ---------------------------------------------------------------------------

/// One recorded state change for a step.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Transition {
    pub id: i64,
    pub step_id: Option<i64>,
    pub timestamp: Option<String>,
    pub from_state: Option<String>,
    pub to_state: Option<String>,
    pub verdict: Option<String>,
    pub duration_secs: Option<f64>,
    pub log_level: Option<String>,
    pub message: Option<String>,
    pub note: Option<String>,
    pub dispatch_skill: Option<String>,
    pub dispatch_duration_secs: Option<f64>,
    pub dispatch_content: Option<String>,
    /// Origin and destination are the same state (an in-place revision).
    pub is_self_transition: bool,
}

impl Transition {
    /// Recorded at `ERROR` log level.
    pub fn is_error(&self) -> bool {
        self.log_level.as_deref() == Some("ERROR")
    }
}

// ---------------------------------------------------------------------------
// Arbiter event
// ---------------------------------------------------------------------------

/// One arbitration attempt, optionally tied to the transition it judged.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ArbiterEvent {
    pub id: i64,
    pub step_id: Option<i64>,
    pub transition_id: Option<i64>,
    pub attempt: Option<i64>,
    pub max_attempts: Option<i64>,
    pub verdict: Option<String>,
    pub pr_number: Option<i64>,
    pub ci_failure_file: Option<String>,
}

// ---------------------------------------------------------------------------
// Step history
// ---------------------------------------------------------------------------

/// Everything the backend records about one step.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StepHistory {
    pub id: Option<i64>,
    pub run_id: Option<i64>,
    pub step_number: Option<i64>,
    pub title: Option<String>,
    pub phase: Option<String>,
    pub started_at: Option<String>,
    pub ended_at: Option<String>,
    pub final_state: Option<String>,
    pub final_verdict: Option<String>,
    pub status: Option<String>,
    pub transitions: Vec<Transition>,
    pub arbiter_events: Vec<ArbiterEvent>,
}

// ---------------------------------------------------------------------------
// Live snapshot
// ---------------------------------------------------------------------------

/// Summary of the run's current position, relayed from the runner's state file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LiveSnapshot {
    pub current_state: Option<String>,
    pub step_number: Option<i64>,
    pub last_transition: Option<String>,
    pub last_result: Option<LastResult>,
    pub spec_id: Option<String>,
    pub consecutive_failures: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LastResult {
    pub verdict: Option<String>,
    pub skill: Option<String>,
    pub title: Option<String>,
}

/// Server-side feed diagnostics.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FeedStatus {
    pub connected_clients: u64,
    pub last_event_id: u64,
    pub recent_event_count: u64,
}
