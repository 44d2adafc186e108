//! Events pushed by the live feed.
//!
//! Every feed message is a JSON object carrying at least `type`, `ts`,
//! `seq`, `step` and `state`. Kind-specific fields ride along untyped
//! and are read back through [`Event::text`]. Consumers never mutate
//! an event once it has been decoded.

use std::fmt;

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

use crate::error::Result;

/// A single event received from the live feed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    /// What happened.
    #[serde(rename = "type")]
    pub kind: EventKind,
    /// Emission time as sent by the producer. See [`Event::timestamp`].
    #[serde(default)]
    pub ts: String,
    /// Monotonic sequence number. Consumers can detect gaps.
    pub seq: u64,
    /// Step number the event belongs to, if any.
    #[serde(default)]
    pub step: Option<i64>,
    /// Pipeline state at emission time.
    #[serde(default, deserialize_with = "null_as_empty")]
    pub state: String,
    /// Kind-specific fields (`from`, `to`, `skill`, `verdict`, ...).
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

/// Closed set of event kinds the feed is known to emit.
///
/// Unrecognized names decode to [`EventKind::Other`] so a newer producer
/// never breaks an older consumer.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum EventKind {
    StateTransition,
    DispatchStart,
    DispatchEnd,
    StepStart,
    StepComplete,
    PrStatus,
    ArbiterVerdict,
    Error,
    RunStart,
    RunStop,
    Other(String),
}

impl EventKind {
    /// All kinds with a dedicated variant, in feed documentation order.
    pub const KNOWN: [EventKind; 10] = [
        EventKind::StateTransition,
        EventKind::DispatchStart,
        EventKind::DispatchEnd,
        EventKind::StepStart,
        EventKind::StepComplete,
        EventKind::PrStatus,
        EventKind::ArbiterVerdict,
        EventKind::Error,
        EventKind::RunStart,
        EventKind::RunStop,
    ];

    /// Wire name of this kind.
    pub fn as_str(&self) -> &str {
        match self {
            EventKind::StateTransition => "state_transition",
            EventKind::DispatchStart => "dispatch_start",
            EventKind::DispatchEnd => "dispatch_end",
            EventKind::StepStart => "step_start",
            EventKind::StepComplete => "step_complete",
            EventKind::PrStatus => "pr_status",
            EventKind::ArbiterVerdict => "arbiter_verdict",
            EventKind::Error => "error",
            EventKind::RunStart => "run_start",
            EventKind::RunStop => "run_stop",
            EventKind::Other(name) => name,
        }
    }
}

impl From<String> for EventKind {
    fn from(name: String) -> Self {
        match name.as_str() {
            "state_transition" => EventKind::StateTransition,
            "dispatch_start" => EventKind::DispatchStart,
            "dispatch_end" => EventKind::DispatchEnd,
            "step_start" => EventKind::StepStart,
            "step_complete" => EventKind::StepComplete,
            "pr_status" => EventKind::PrStatus,
            "arbiter_verdict" => EventKind::ArbiterVerdict,
            "error" => EventKind::Error,
            "run_start" => EventKind::RunStart,
            "run_stop" => EventKind::RunStop,
            _ => EventKind::Other(name),
        }
    }
}

impl From<&str> for EventKind {
    fn from(name: &str) -> Self {
        EventKind::from(name.to_string())
    }
}

impl From<EventKind> for String {
    fn from(kind: EventKind) -> Self {
        match kind {
            EventKind::Other(name) => name,
            known => known.as_str().to_string(),
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Event {
    /// Decode a raw feed payload.
    pub fn from_json(raw: &str) -> Result<Self> {
        Ok(serde_json::from_str(raw)?)
    }

    /// Read a kind-specific field as text.
    ///
    /// Producers are inconsistent about quoting numbers, so numeric and
    /// boolean values are rendered to strings. `null` reads as absent.
    pub fn text(&self, name: &str) -> Option<String> {
        match self.fields.get(name)? {
            Value::String(s) => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            Value::Bool(b) => Some(b.to_string()),
            _ => None,
        }
    }

    /// Parse `ts` leniently: RFC 3339 first, then naive ISO-8601 as UTC.
    pub fn timestamp(&self) -> Option<DateTime<Utc>> {
        if let Ok(ts) = DateTime::parse_from_rfc3339(&self.ts) {
            return Some(ts.with_timezone(&Utc));
        }
        NaiveDateTime::parse_from_str(&self.ts, "%Y-%m-%dT%H:%M:%S%.f")
            .ok()
            .map(|naive| naive.and_utc())
    }

    /// One-line human summary for event log displays.
    pub fn describe(&self) -> String {
        let field = |name: &str| self.text(name).unwrap_or_else(|| "?".to_string());
        let step = self
            .step
            .map(|n| n.to_string())
            .unwrap_or_else(|| "?".to_string());

        match &self.kind {
            EventKind::StateTransition => {
                let note = self
                    .text("note")
                    .map(|n| format!(" ({n})"))
                    .unwrap_or_default();
                format!("{} \u{2192} {}{note}", field("from"), field("to"))
            }
            EventKind::DispatchStart => {
                let model = self
                    .text("model")
                    .map(|m| format!(" [{m}]"))
                    .unwrap_or_default();
                format!("Dispatch: {}{model}", field("skill"))
            }
            EventKind::DispatchEnd => match self.text("error") {
                Some(error) => format!(
                    "Dispatch {error}: {} ({}s)",
                    field("skill"),
                    field("elapsed_secs")
                ),
                None => format!(
                    "Dispatch OK: {} ({}s)",
                    field("skill"),
                    field("elapsed_secs")
                ),
            },
            EventKind::StepStart => format!("Step {step}: {}", field("title")),
            EventKind::StepComplete => format!("Step {step} complete ({})", field("verdict")),
            EventKind::PrStatus => {
                format!("PR #{} \u{2192} {}", field("pr_number"), field("status"))
            }
            EventKind::ArbiterVerdict => {
                let error = self
                    .text("error")
                    .map(|e| format!(" [{e}]"))
                    .unwrap_or_default();
                format!(
                    "Arbiter: {} (attempt {}){error}",
                    field("verdict"),
                    field("attempt")
                )
            }
            EventKind::Error => self.text("note").unwrap_or_else(|| "Error".to_string()),
            EventKind::RunStart => "ORDER run started".to_string(),
            EventKind::RunStop => "ORDER run stopped".to_string(),
            EventKind::Other(name) => name.clone(),
        }
    }
}

fn null_as_empty<'de, D>(deserializer: D) -> std::result::Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_default())
}
