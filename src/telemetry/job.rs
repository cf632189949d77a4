//! Job span helpers.
//!
//! One span per remote call: `job.dispatch` around a submission,
//! `job.poll` around a status check.

use tracing::Span;

use crate::model::{JobId, JobStatus};

/// Start a span for submitting a waiting job.
pub fn start_dispatch_span(job_id: &JobId) -> Span {
    tracing::info_span!(
        "job.dispatch",
        "job.id" = %job_id,
        "job.status" = tracing::field::Empty,
    )
}

/// Start a span for one remote status check.
pub fn start_poll_span(job_id: &JobId) -> Span {
    tracing::debug_span!(
        "job.poll",
        "job.id" = %job_id,
        "job.status" = tracing::field::Empty,
    )
}

/// Record a status transition on the span and emit an event inside it.
pub fn record_status_transition(span: &Span, from: JobStatus, to: JobStatus) {
    span.record("job.status", tracing::field::display(to));
    span.in_scope(|| {
        tracing::info!(%from, %to, "status_transition");
    });
}
