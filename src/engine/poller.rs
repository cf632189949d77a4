//! Status polling for the jobs that count against the budget.

use std::sync::Arc;
use std::time::{Duration, Instant};

use opentelemetry::KeyValue;
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, debug, warn};

use super::Verbosity;
use super::budget::{BudgetPolicy, select_active};
use super::mirror::LocalJobMirror;
use crate::error::Result;
use crate::host::{ActivityOracle, Identity};
use crate::model::JobRecord;
use crate::remote::RemoteCluster;
use crate::store::JobStore;
use crate::telemetry::job::{record_status_transition, start_poll_span};
use crate::telemetry::metrics;

/// Tally of one polling pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PollReport {
    /// Status checks that returned.
    pub checked: usize,
    /// Checks whose result was written to the store.
    pub changed: usize,
    /// Checks or writes that failed.
    pub failed: usize,
}

/// Re-checks remote status for the active set, one job at a time.
pub struct StatusPoller {
    mirror: Arc<LocalJobMirror>,
    store: Arc<dyn JobStore>,
    remote: Arc<dyn RemoteCluster>,
    activity: Arc<dyn ActivityOracle>,
    identity: Arc<dyn Identity>,
    policy: BudgetPolicy,
    spacing: Duration,
    verbosity: Verbosity,
}

impl StatusPoller {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        mirror: Arc<LocalJobMirror>,
        store: Arc<dyn JobStore>,
        remote: Arc<dyn RemoteCluster>,
        activity: Arc<dyn ActivityOracle>,
        identity: Arc<dyn Identity>,
        policy: BudgetPolicy,
        spacing: Duration,
        verbosity: Verbosity,
    ) -> Self {
        Self {
            mirror,
            store,
            remote,
            activity,
            identity,
            policy,
            spacing,
            verbosity,
        }
    }

    /// Check each job in the active set in order, pausing `spacing` between
    /// checks. Individual failures are logged and counted; they do not stop
    /// the pass. Cancellation is observed between checks.
    ///
    /// The mirror is not touched; it catches up on its next refresh.
    pub async fn poll_active(&self, cancel: &CancellationToken) -> Result<PollReport> {
        let mut report = PollReport::default();

        if !self.activity.is_foreground() {
            diag!(self.verbosity, "poll skipped: host in background");
            return Ok(report);
        }

        let snapshot = self.mirror.snapshot().await;
        if snapshot.is_empty() {
            return Ok(report);
        }

        let budget = self.policy.current(self.identity.as_ref());
        let poll_set = select_active(&snapshot, budget).jobs;
        diag!(self.verbosity, budget, jobs = poll_set.len(), "polling active jobs");

        for (i, job) in poll_set.iter().enumerate() {
            if cancel.is_cancelled() {
                break;
            }

            let span = start_poll_span(&job.id);
            match self.check_one(job).instrument(span.clone()).await {
                Ok(Some(fresh)) => {
                    record_status_transition(&span, job.status, fresh.status);
                    report.checked += 1;
                    report.changed += 1;
                }
                Ok(None) => report.checked += 1,
                Err(e) => {
                    warn!(job_id = %job.id, error = %e, "status check failed");
                    metrics::jobs_polled().add(1, &[KeyValue::new("result", "error")]);
                    report.failed += 1;
                }
            }

            if i + 1 < poll_set.len() {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = tokio::time::sleep(self.spacing) => {}
                }
            }
        }

        Ok(report)
    }

    /// Query one job and persist it if anything changed. Returns the new
    /// record when a write happened.
    async fn check_one(&self, job: &JobRecord) -> Result<Option<JobRecord>> {
        let start = Instant::now();
        let fresh = self.remote.check_status(job).await?;
        metrics::operation_duration_ms().record(
            start.elapsed().as_secs_f64() * 1000.0,
            &[KeyValue::new("operation", "check_status")],
        );

        if !fresh.differs_from(job) {
            metrics::jobs_polled().add(1, &[KeyValue::new("result", "unchanged")]);
            return Ok(None);
        }

        job.status.ensure_transition(fresh.status)?;
        self.store.update(&fresh).await?;

        debug!(job_id = %job.id, from = %job.status, to = %fresh.status, "job status updated");
        metrics::jobs_polled().add(1, &[KeyValue::new("result", "changed")]);
        Ok(Some(fresh))
    }
}
