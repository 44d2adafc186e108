//! # peace-live
//!
//! Live telemetry ingestion and pipeline state reconstruction for the
//! peace orchestrator dashboard.
//!
//! Subscribes to the backend's ordered event feed, keeps a bounded event
//! log, detects sequence gaps, and signals which cached views are stale.
//! Stage status for a step is always recomputed from the fetched
//! transition history, never patched from individual events.

pub mod config;
pub mod error;
pub mod event;
pub mod history;
pub mod model;
pub mod pipeline;
pub mod reconcile;
pub mod stream;
pub mod telemetry;
