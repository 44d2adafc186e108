//! Live feed ingestion: transport, sequence tracking, event log,
//! invalidation routing, and the reconnecting session that ties them together.

pub mod backoff;
pub mod client;
pub mod dispatch;
pub mod feed;
pub mod ingest;
pub mod invalidation;
pub mod log;
pub mod sequence;
pub mod sse;

pub use client::{ConnectionStatus, LiveSession, LiveState, SessionConfig};
pub use dispatch::{ActiveDispatch, active_dispatch, find_active_dispatch, format_elapsed};
pub use feed::{EventFeed, FeedStream, HttpEventFeed};
pub use invalidation::{CacheView, Invalidation};
pub use log::EventLog;
pub use sequence::{SeqCheck, SequenceTracker};
