//! Metric instrument factories for peace-live.
//!
//! Uses the OTel Meter API with the globally-registered `MeterProvider`.
//! All instruments are created lazily from the `"peace-live"` meter; with
//! no provider installed they are no-ops.

use opentelemetry::metrics::{Counter, Histogram, Meter};

fn meter() -> Meter {
    opentelemetry::global::meter("peace-live")
}

/// Counter: feed events accepted into the log.
/// Labels: `kind`.
pub fn events_received() -> Counter<u64> {
    meter()
        .u64_counter("peace.live.events_received")
        .with_description("Feed events accepted into the event log")
        .build()
}

/// Counter: feed payloads dropped because they could not be decoded.
pub fn events_malformed() -> Counter<u64> {
    meter()
        .u64_counter("peace.live.events_malformed")
        .with_description("Feed payloads dropped as malformed")
        .build()
}

/// Counter: sequence discontinuities that forced a full resync.
/// Labels: `reason` ("gap" | "regression").
pub fn sequence_breaks() -> Counter<u64> {
    meter()
        .u64_counter("peace.live.sequence_breaks")
        .with_description("Sequence gaps and regressions on the live feed")
        .build()
}

/// Counter: connection attempts after a failure.
pub fn reconnects() -> Counter<u64> {
    meter()
        .u64_counter("peace.live.reconnects")
        .with_description("Reconnect attempts to the live feed")
        .build()
}

/// Counter: invalidation signals emitted.
/// Labels: `scope` ("all" | "selective").
pub fn invalidations() -> Counter<u64> {
    meter()
        .u64_counter("peace.live.invalidations")
        .with_description("Cache invalidation signals emitted")
        .build()
}

/// Counter: historical fetches.
/// Labels: `resource` ("step" | "snapshot"), `result` ("ok" | "error").
pub fn history_fetches() -> Counter<u64> {
    meter()
        .u64_counter("peace.history.fetches")
        .with_description("Historical record fetches")
        .build()
}

/// Histogram: stage reconstruction duration in milliseconds.
pub fn reconstruct_duration_ms() -> Histogram<f64> {
    meter()
        .f64_histogram("peace.reconstruct.duration_ms")
        .with_description("Pipeline state reconstruction duration in milliseconds")
        .with_unit("ms")
        .build()
}
