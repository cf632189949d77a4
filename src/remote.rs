//! Remote cluster client seam.
//!
//! The controller only needs two calls from the cluster: admit a waiting
//! job, and report the current status of an admitted one. Transport,
//! authentication and timeouts belong to the implementation.

use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use chrono::Utc;
use tracing::debug;
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::model::{JobRecord, JobStatus};

/// Remote cluster collaborator consumed by the controller.
#[async_trait]
pub trait RemoteCluster: Send + Sync {
    /// Submit a waiting job. Returns the record as the cluster now sees it
    /// (typically `Queued` with a remote id assigned).
    async fn submit(&self, record: &JobRecord) -> Result<JobRecord>;

    /// Fetch the current remote status of an admitted job.
    async fn check_status(&self, record: &JobRecord) -> Result<JobRecord>;
}

/// In-process stand-in for the cluster.
///
/// Every status check advances a job one step along
/// `Queued -> Processing -> Done`. Failures can be injected to exercise the
/// controller's retry-on-next-tick behavior.
#[derive(Default)]
pub struct SimulatedCluster {
    jobs: Mutex<HashMap<String, JobStatus>>,
    submissions: AtomicUsize,
    checks: AtomicUsize,
    failing_submissions: AtomicUsize,
    failing_checks: AtomicUsize,
}

impl SimulatedCluster {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reject the next `n` submissions.
    pub fn fail_next_submissions(&self, n: usize) {
        self.failing_submissions.store(n, Ordering::SeqCst);
    }

    /// Reject the next `n` status checks.
    pub fn fail_next_checks(&self, n: usize) {
        self.failing_checks.store(n, Ordering::SeqCst);
    }

    /// Submission attempts seen so far, failed ones included.
    pub fn submissions(&self) -> usize {
        self.submissions.load(Ordering::SeqCst)
    }

    /// Status checks seen so far, failed ones included.
    pub fn status_checks(&self) -> usize {
        self.checks.load(Ordering::SeqCst)
    }

    fn take_failure(counter: &AtomicUsize) -> bool {
        counter
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }

    fn jobs(&self) -> Result<std::sync::MutexGuard<'_, HashMap<String, JobStatus>>> {
        self.jobs
            .lock()
            .map_err(|_| Error::Other("simulated cluster lock poisoned".to_string()))
    }
}

#[async_trait]
impl RemoteCluster for SimulatedCluster {
    async fn submit(&self, record: &JobRecord) -> Result<JobRecord> {
        self.submissions.fetch_add(1, Ordering::SeqCst);
        if Self::take_failure(&self.failing_submissions) {
            return Err(Error::Submission {
                job_id: record.id,
                reason: "cluster unavailable".to_string(),
            });
        }

        let remote_id = Uuid::new_v4().to_string();
        let mut jobs = self.jobs()?;
        jobs.insert(remote_id.clone(), JobStatus::Queued);
        let position = jobs.len() as u32;
        debug!(job_id = %record.id, %remote_id, "simulated submit");

        Ok(JobRecord {
            remote_id: Some(remote_id),
            status: JobStatus::Queued,
            queue_position: Some(position),
            updated_at: Utc::now(),
            ..record.clone()
        })
    }

    async fn check_status(&self, record: &JobRecord) -> Result<JobRecord> {
        self.checks.fetch_add(1, Ordering::SeqCst);
        if Self::take_failure(&self.failing_checks) {
            return Err(Error::Poll {
                job_id: record.id,
                reason: "cluster unavailable".to_string(),
            });
        }

        let remote_id = record.remote_id.as_deref().ok_or_else(|| Error::Poll {
            job_id: record.id,
            reason: "job has no remote id".to_string(),
        })?;

        let mut jobs = self.jobs()?;
        let status = jobs.get_mut(remote_id).ok_or_else(|| Error::Poll {
            job_id: record.id,
            reason: format!("unknown remote id {remote_id}"),
        })?;
        *status = match *status {
            JobStatus::Queued => JobStatus::Processing,
            JobStatus::Processing => JobStatus::Done,
            other => other,
        };

        let wait_time_secs = (*status == JobStatus::Processing).then_some(5);

        Ok(JobRecord {
            status: *status,
            queue_position: None,
            wait_time_secs,
            updated_at: Utc::now(),
            ..record.clone()
        })
    }
}
