//! Integration tests for telemetry initialization and span helpers.

use jobgate::model::{JobId, JobStatus};

#[test]
fn telemetry_initializes_without_endpoint() {
    // Note: tracing subscriber can only be set once per process.
    let config = jobgate::telemetry::TelemetryConfig {
        endpoint: None,
        service_name: "jobgate-test".to_string(),
        default_filter: "debug".to_string(),
    };
    // May return Err if another test already set a global subscriber.
    if let Ok(guard) = jobgate::telemetry::init_telemetry(config) {
        assert!(!guard.is_exporting());
        guard.force_flush();
    }
}

#[test]
fn dispatch_span_records_transition() {
    let span = jobgate::telemetry::job::start_dispatch_span(&JobId::new());
    jobgate::telemetry::job::record_status_transition(&span, JobStatus::Waiting, JobStatus::Queued);
}

#[test]
fn poll_span_records_transition() {
    let span = jobgate::telemetry::job::start_poll_span(&JobId::new());
    jobgate::telemetry::job::record_status_transition(&span, JobStatus::Processing, JobStatus::Done);
}

#[test]
fn metrics_record_without_a_provider() {
    use opentelemetry::KeyValue;

    jobgate::telemetry::metrics::jobs_dispatched().add(1, &[KeyValue::new("result", "ok")]);
    jobgate::telemetry::metrics::operation_duration_ms()
        .record(12.5, &[KeyValue::new("operation", "submit")]);
}
