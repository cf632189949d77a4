//! Admission: submit the oldest waiting job when the budget has headroom.

use std::sync::Arc;
use std::time::Instant;

use opentelemetry::KeyValue;
use tokio::sync::Mutex;
use tracing::{Instrument, info, warn};

use super::Verbosity;
use super::budget::{BudgetPolicy, select_active};
use super::mirror::LocalJobMirror;
use crate::error::{Error, Result};
use crate::host::{ActivityOracle, Identity, QueueSettings};
use crate::model::{JobRecord, JobStatus};
use crate::remote::RemoteCluster;
use crate::store::JobStore;
use crate::telemetry::job::{record_status_transition, start_dispatch_span};
use crate::telemetry::metrics;

/// Why an admission attempt did nothing before looking at the budget.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    Background,
    QuotaExceeded,
    QueuePaused,
    EmptyMirror,
}

impl SkipReason {
    pub fn as_str(self) -> &'static str {
        match self {
            SkipReason::Background => "background",
            SkipReason::QuotaExceeded => "quota_exceeded",
            SkipReason::QueuePaused => "queue_paused",
            SkipReason::EmptyMirror => "empty_mirror",
        }
    }
}

/// What one admission attempt did.
#[derive(Debug, Clone, PartialEq)]
pub enum DispatchOutcome {
    /// A precondition failed; nothing was read or sent.
    Skipped(SkipReason),
    /// Processing + queued already fills the budget.
    Saturated { active: usize, budget: usize },
    /// Headroom exists but nothing is waiting.
    NoWaiting,
    /// One job was submitted; carries the record the cluster returned.
    Dispatched(JobRecord),
}

/// Decides whether to submit the next waiting job.
pub struct AdmissionController {
    mirror: Arc<LocalJobMirror>,
    store: Arc<dyn JobStore>,
    remote: Arc<dyn RemoteCluster>,
    activity: Arc<dyn ActivityOracle>,
    settings: Arc<dyn QueueSettings>,
    identity: Arc<dyn Identity>,
    policy: BudgetPolicy,
    verbosity: Verbosity,
    /// Records the cluster accepted but the store has not yet saved.
    unsaved: Mutex<Vec<JobRecord>>,
}

impl AdmissionController {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        mirror: Arc<LocalJobMirror>,
        store: Arc<dyn JobStore>,
        remote: Arc<dyn RemoteCluster>,
        activity: Arc<dyn ActivityOracle>,
        settings: Arc<dyn QueueSettings>,
        identity: Arc<dyn Identity>,
        policy: BudgetPolicy,
        verbosity: Verbosity,
    ) -> Self {
        Self {
            mirror,
            store,
            remote,
            activity,
            settings,
            identity,
            policy,
            verbosity,
            unsaved: Mutex::new(Vec::new()),
        }
    }

    /// Number of submitted records still waiting to be saved to the store.
    pub async fn unsaved_len(&self) -> usize {
        self.unsaved.lock().await.len()
    }

    /// Submit at most one waiting job.
    ///
    /// A failed submission is returned as an error without retrying; the
    /// job stays `Waiting` and the next attempt considers it again.
    ///
    /// If the cluster accepted a job but the store write failed, the
    /// accepted record is kept and saved on a later attempt. No other job is
    /// submitted until that write succeeds, so a job is never sent twice.
    pub async fn try_dispatch_next(&self) -> Result<DispatchOutcome> {
        let mut snapshot = self.mirror.snapshot().await;

        if let Some(reason) = self.precondition_failure(snapshot.is_empty()) {
            diag!(self.verbosity, reason = reason.as_str(), "admission skipped");
            metrics::dispatch_skipped().add(1, &[KeyValue::new("reason", reason.as_str())]);
            return Ok(DispatchOutcome::Skipped(reason));
        }

        // Held to the end so concurrent callers cannot both submit.
        let mut unsaved = self.unsaved.lock().await;
        if !unsaved.is_empty() {
            self.save_unsaved(&mut unsaved).await?;
            self.mirror.refresh().await?;
            snapshot = self.mirror.snapshot().await;
        }

        let budget = self.policy.current(self.identity.as_ref());
        let active = select_active(&snapshot, budget);
        diag!(
            self.verbosity,
            budget,
            active = active.untruncated_len,
            pending = snapshot.len(),
            "admission check"
        );

        if !active.has_headroom(budget) {
            metrics::dispatch_skipped().add(1, &[KeyValue::new("reason", "saturated")]);
            return Ok(DispatchOutcome::Saturated {
                active: active.untruncated_len,
                budget,
            });
        }

        // The mirror is ordered oldest first.
        let Some(next) = snapshot.iter().find(|r| r.status == JobStatus::Waiting) else {
            return Ok(DispatchOutcome::NoWaiting);
        };
        diag!(self.verbosity, job_id = %next.id, "next waiting job");

        let span = start_dispatch_span(&next.id);
        let submitted = self
            .submit(next, &mut unsaved)
            .instrument(span.clone())
            .await?;
        record_status_transition(&span, next.status, submitted.status);

        // Make the new status visible to the very next poll.
        self.mirror.refresh().await?;

        Ok(DispatchOutcome::Dispatched(submitted))
    }

    fn precondition_failure(&self, mirror_empty: bool) -> Option<SkipReason> {
        if !self.activity.is_foreground() {
            Some(SkipReason::Background)
        } else if self.settings.storage_quota_exceeded() {
            Some(SkipReason::QuotaExceeded)
        } else if self.settings.is_queue_paused() {
            Some(SkipReason::QueuePaused)
        } else if mirror_empty {
            Some(SkipReason::EmptyMirror)
        } else {
            None
        }
    }

    async fn save_unsaved(&self, unsaved: &mut Vec<JobRecord>) -> Result<()> {
        while let Some(record) = unsaved.first() {
            match self.store.update(record).await {
                Ok(()) => info!(job_id = %record.id, "submitted job saved on retry"),
                Err(Error::NotFound(id)) => {
                    warn!(job_id = %id, "submitted job no longer in store, dropping");
                }
                Err(e) => return Err(e),
            }
            unsaved.remove(0);
        }
        Ok(())
    }

    async fn submit(&self, next: &JobRecord, unsaved: &mut Vec<JobRecord>) -> Result<JobRecord> {
        let start = Instant::now();
        let result = self.remote.submit(next).await;
        metrics::operation_duration_ms().record(
            start.elapsed().as_secs_f64() * 1000.0,
            &[KeyValue::new("operation", "submit")],
        );

        let submitted = match result {
            Ok(record) => record,
            Err(e) => {
                warn!(job_id = %next.id, error = %e, "submission failed");
                metrics::jobs_dispatched().add(1, &[KeyValue::new("result", "error")]);
                return Err(e);
            }
        };

        metrics::jobs_dispatched().add(1, &[KeyValue::new("result", "ok")]);
        if let Err(e) = self.store.update(&submitted).await {
            warn!(job_id = %submitted.id, error = %e, "store write failed after submission, will retry");
            unsaved.push(submitted);
            return Err(e);
        }
        info!(
            job_id = %submitted.id,
            remote_id = submitted.remote_id.as_deref().unwrap_or("-"),
            status = %submitted.status,
            "job submitted"
        );
        Ok(submitted)
    }
}
