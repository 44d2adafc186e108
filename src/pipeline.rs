//! Pipeline topology and per-stage state reconstruction.
//!
//! A step moves through a fixed, ordered list of stages. The backend's
//! transition history for a step may be incomplete or arrive in any order,
//! so stage state is always derived from scratch by [`reconstruct`] and
//! never patched in place.
//!
//! Reachability is lenient: reaching stage `k` marks every earlier stage
//! as reached even when their own transition records are missing. This
//! can mask genuine data loss as progress; it is kept because historical
//! logs are known to drop intermediate records.

use std::collections::{HashMap, HashSet};
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::model::{ArbiterEvent, Transition};

/// Verdicts that mark the destination stage as failed.
pub const BLOCKING_VERDICTS: [&str; 2] = ["MERGE_BLOCKED", "TASKS_FAILED"];

// ---------------------------------------------------------------------------
// Topology
// ---------------------------------------------------------------------------

/// One named node of the pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Stage {
    /// State id as it appears in `to_state` (e.g. `MERGE_PRS`).
    pub id: String,
    /// Short display label (e.g. `Merge`).
    pub label: String,
}

impl Stage {
    pub fn new(id: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            label: label.into(),
        }
    }
}

/// Ordered, duplicate-free list of stages.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Topology {
    stages: Vec<Stage>,
}

/// TOML layout: a list of `[[stage]]` tables.
#[derive(Debug, Deserialize)]
struct TopologyFile {
    #[serde(rename = "stage")]
    stages: Vec<Stage>,
}

impl Topology {
    /// The nine-stage ORDER pipeline.
    pub fn standard() -> Self {
        let stages = [
            ("INIT", "Init"),
            ("PARSE_ROADMAP", "Parse"),
            ("CREATE_SPEC", "Spec"),
            ("REVIEW_SPEC", "Review"),
            ("PLAN_WORK", "Plan"),
            ("EXECUTE_TASKS", "Execute"),
            ("MERGE_PRS", "Merge"),
            ("VERIFY_COMPLETION", "Verify"),
            ("HANDOFF", "Handoff"),
        ]
        .into_iter()
        .map(|(id, label)| Stage::new(id, label))
        .collect();
        Self { stages }
    }

    /// Build a topology, rejecting empty lists and duplicate ids.
    pub fn new(stages: Vec<Stage>) -> Result<Self> {
        if stages.is_empty() {
            return Err(Error::Topology("no stages defined".to_string()));
        }
        let mut seen = HashSet::new();
        for stage in &stages {
            if !seen.insert(stage.id.as_str()) {
                return Err(Error::Topology(format!("duplicate stage id {}", stage.id)));
            }
        }
        Ok(Self { stages })
    }

    /// Load a topology from a TOML file of `[[stage]]` tables.
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let file: TopologyFile = toml::from_str(&content)
            .map_err(|e| Error::Topology(format!("bad pipeline file {}: {e}", path.display())))?;
        Self::new(file.stages)
    }

    pub fn stages(&self) -> &[Stage] {
        &self.stages
    }

    pub fn len(&self) -> usize {
        self.stages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }

    /// Position of a state id in the pipeline order.
    pub fn index_of(&self, id: &str) -> Option<usize> {
        self.stages.iter().position(|stage| stage.id == id)
    }
}

impl Default for Topology {
    fn default() -> Self {
        Self::standard()
    }
}

// ---------------------------------------------------------------------------
// Stage info
// ---------------------------------------------------------------------------

/// Derived state of one stage for one step.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StageInfo {
    pub reached: bool,
    pub failed: bool,
    pub self_transition_count: u32,
    pub arbiter_event_count: u32,
}

/// Display classification of a stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StageStatus {
    /// Not reached yet.
    Pending,
    /// Reached, with an error-level or blocking transition.
    Failed,
    /// Reached after one or more in-place revisions.
    Revised,
    /// Reached cleanly.
    Passed,
}

impl StageInfo {
    pub fn status(&self) -> StageStatus {
        if !self.reached {
            StageStatus::Pending
        } else if self.failed {
            StageStatus::Failed
        } else if self.self_transition_count > 0 {
            StageStatus::Revised
        } else {
            StageStatus::Passed
        }
    }
}

impl std::fmt::Display for StageStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            StageStatus::Pending => "pending",
            StageStatus::Failed => "failed",
            StageStatus::Revised => "revised",
            StageStatus::Passed => "passed",
        };
        write!(f, "{s}")
    }
}

/// Stage state for every stage of a topology, in pipeline order.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct StageMap {
    entries: Vec<(Stage, StageInfo)>,
}

impl StageMap {
    /// Look up a stage by state id.
    pub fn get(&self, id: &str) -> Option<&StageInfo> {
        self.entries
            .iter()
            .find(|(stage, _)| stage.id == id)
            .map(|(_, info)| info)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Stage, &StageInfo)> {
        self.entries.iter().map(|(stage, info)| (stage, info))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// The furthest stage reached, if any.
    pub fn highest_reached(&self) -> Option<&Stage> {
        self.entries
            .iter()
            .rev()
            .find(|(_, info)| info.reached)
            .map(|(stage, _)| stage)
    }
}

// ---------------------------------------------------------------------------
// Reconstruction
// ---------------------------------------------------------------------------

/// Derive per-stage state from a step's full transition and arbitration history.
///
/// Transitions whose `to_state` is absent or not part of the topology are
/// ignored, as are arbiter events whose `transition_id` does not resolve to
/// such a transition. The result depends only on index maxima and counts,
/// so input order never matters.
pub fn reconstruct(
    topology: &Topology,
    transitions: &[Transition],
    arbiter_events: &[ArbiterEvent],
) -> StageMap {
    let mut infos = vec![StageInfo::default(); topology.len()];
    let mut stage_of_transition: HashMap<i64, usize> = HashMap::new();
    let mut highest_reached: Option<usize> = None;

    for transition in transitions {
        let Some(index) = transition
            .to_state
            .as_deref()
            .and_then(|state| topology.index_of(state))
        else {
            continue;
        };

        highest_reached = highest_reached.max(Some(index));
        stage_of_transition.insert(transition.id, index);

        let info = &mut infos[index];
        if transition.is_self_transition {
            info.self_transition_count += 1;
        }
        let blocked = transition
            .verdict
            .as_deref()
            .is_some_and(|verdict| BLOCKING_VERDICTS.contains(&verdict));
        if transition.is_error() || blocked {
            info.failed = true;
        }
    }

    if let Some(highest) = highest_reached {
        for info in &mut infos[..=highest] {
            info.reached = true;
        }
    }

    for event in arbiter_events {
        let resolved = event
            .transition_id
            .and_then(|id| stage_of_transition.get(&id));
        if let Some(&index) = resolved {
            infos[index].arbiter_event_count += 1;
        }
    }

    StageMap {
        entries: topology.stages().iter().cloned().zip(infos).collect(),
    }
}
