//! Metric instrument factories for jobgate.
//!
//! Uses the OTel Meter API with the globally-registered `MeterProvider`.
//! Without an OTLP endpoint the global provider is a no-op, so recording is
//! always safe.

use opentelemetry::metrics::{Counter, Histogram, Meter};

fn meter() -> Meter {
    opentelemetry::global::meter("jobgate")
}

/// Counter: submission attempts.
/// Labels: `result` ("ok" | "error").
pub fn jobs_dispatched() -> Counter<u64> {
    meter()
        .u64_counter("jobgate.jobs.dispatched")
        .with_description("Number of waiting jobs submitted to the cluster")
        .build()
}

/// Counter: admission attempts that did not submit.
/// Labels: `reason` ("background" | "quota_exceeded" | "queue_paused" |
/// "empty_mirror" | "saturated").
pub fn dispatch_skipped() -> Counter<u64> {
    meter()
        .u64_counter("jobgate.dispatch.skipped")
        .with_description("Admission attempts that submitted nothing")
        .build()
}

/// Counter: status checks.
/// Labels: `result` ("changed" | "unchanged" | "error").
pub fn jobs_polled() -> Counter<u64> {
    meter()
        .u64_counter("jobgate.jobs.polled")
        .with_description("Number of remote status checks")
        .build()
}

/// Counter: mirror refresh calls.
/// Labels: `outcome` ("reloaded" | "clean").
pub fn mirror_refreshes() -> Counter<u64> {
    meter()
        .u64_counter("jobgate.mirror.refreshes")
        .with_description("Mirror refreshes, split by whether the store was re-read")
        .build()
}

/// Counter: control loop iterations that ended in an error.
/// Labels: `loop` ("refresh" | "admission" | "poll").
pub fn loop_errors() -> Counter<u64> {
    meter()
        .u64_counter("jobgate.loop.errors")
        .with_description("Failed control loop iterations")
        .build()
}

/// Histogram: remote call duration in milliseconds.
/// Labels: `operation` ("submit" | "check_status").
pub fn operation_duration_ms() -> Histogram<f64> {
    meter()
        .f64_histogram("jobgate.operation.duration_ms")
        .with_description("Remote call duration in milliseconds")
        .with_unit("ms")
        .build()
}
