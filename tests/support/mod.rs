//! Shared fakes for the controller's collaborators.

#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use jobgate::engine::{AdmissionController, BudgetPolicy, LocalJobMirror, StatusPoller, Verbosity};
use jobgate::error::{Error, Result};
use jobgate::host::HostState;
use jobgate::model::{JobId, JobRecord, JobStatus, NewJob};
use jobgate::remote::RemoteCluster;
use jobgate::store::{ChangeMarker, JobStore, MemoryStore};

// ---------------------------------------------------------------------------
// Store
// ---------------------------------------------------------------------------

/// MemoryStore that counts reads and can be made to fail reads or writes.
#[derive(Default)]
pub struct CountingStore {
    pub inner: MemoryStore,
    pub record_reads: AtomicUsize,
    pub marker_reads: AtomicUsize,
    pub fail_reads: AtomicBool,
    /// Number of upcoming `update` calls that fail.
    pub fail_next_updates: AtomicUsize,
}

impl CountingStore {
    pub fn record_reads(&self) -> usize {
        self.record_reads.load(Ordering::SeqCst)
    }

    pub fn status_of(&self, id: JobId) -> JobStatus {
        self.inner.get(id).expect("record exists").status
    }
}

#[async_trait]
impl JobStore for CountingStore {
    async fn pending_records(&self) -> Result<Vec<JobRecord>> {
        self.record_reads.fetch_add(1, Ordering::SeqCst);
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(Error::StoreRead("store offline".to_string()));
        }
        self.inner.pending_records().await
    }

    async fn change_marker(&self) -> Result<ChangeMarker> {
        self.marker_reads.fetch_add(1, Ordering::SeqCst);
        self.inner.change_marker().await
    }

    async fn update(&self, record: &JobRecord) -> Result<()> {
        let failing = self
            .fail_next_updates
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if failing {
            return Err(Error::StoreWrite("disk full".to_string()));
        }
        self.inner.update(record).await
    }
}

// ---------------------------------------------------------------------------
// Remote
// ---------------------------------------------------------------------------

/// Cluster whose status answers are set by the test.
#[derive(Default)]
pub struct ScriptedCluster {
    reported: Mutex<HashMap<JobId, JobStatus>>,
    submitted: Mutex<Vec<JobId>>,
    checked: Mutex<Vec<JobId>>,
    failing_checks: Mutex<HashSet<JobId>>,
    pub fail_submissions: AtomicBool,
}

impl ScriptedCluster {
    /// Status the next checks of `id` will report.
    pub fn report(&self, id: JobId, status: JobStatus) {
        self.reported.lock().unwrap().insert(id, status);
    }

    pub fn fail_checks_for(&self, id: JobId) {
        self.failing_checks.lock().unwrap().insert(id);
    }

    pub fn submitted(&self) -> Vec<JobId> {
        self.submitted.lock().unwrap().clone()
    }

    pub fn checked(&self) -> Vec<JobId> {
        self.checked.lock().unwrap().clone()
    }

    pub fn remote_calls(&self) -> usize {
        self.submitted().len() + self.checked().len()
    }
}

#[async_trait]
impl RemoteCluster for ScriptedCluster {
    async fn submit(&self, record: &JobRecord) -> Result<JobRecord> {
        self.submitted.lock().unwrap().push(record.id);
        if self.fail_submissions.load(Ordering::SeqCst) {
            return Err(Error::Submission {
                job_id: record.id,
                reason: "503 service unavailable".to_string(),
            });
        }
        Ok(JobRecord {
            status: JobStatus::Queued,
            remote_id: Some(format!("remote-{}", record.id)),
            queue_position: Some(1),
            ..record.clone()
        })
    }

    async fn check_status(&self, record: &JobRecord) -> Result<JobRecord> {
        self.checked.lock().unwrap().push(record.id);
        if self.failing_checks.lock().unwrap().contains(&record.id) {
            return Err(Error::Poll {
                job_id: record.id,
                reason: "timeout".to_string(),
            });
        }
        let status = self
            .reported
            .lock()
            .unwrap()
            .get(&record.id)
            .copied()
            .unwrap_or(record.status);
        Ok(JobRecord {
            status,
            ..record.clone()
        })
    }
}

// ---------------------------------------------------------------------------
// Harness
// ---------------------------------------------------------------------------

pub struct Harness {
    pub store: Arc<CountingStore>,
    pub cluster: Arc<ScriptedCluster>,
    pub host: Arc<HostState>,
    pub mirror: Arc<LocalJobMirror>,
    seeded: AtomicUsize,
}

impl Harness {
    pub fn new() -> Self {
        let store = Arc::new(CountingStore::default());
        let mirror = Arc::new(LocalJobMirror::new(store.clone()));
        Self {
            store,
            cluster: Arc::new(ScriptedCluster::default()),
            host: Arc::new(HostState::new()),
            mirror,
            seeded: AtomicUsize::new(0),
        }
    }

    /// Insert a record with the given status. Each call is one minute newer
    /// than the previous one.
    pub async fn seed(&self, status: JobStatus) -> JobRecord {
        let n = self.seeded.fetch_add(1, Ordering::SeqCst) as i64;
        self.seed_at(status, n).await
    }

    /// Insert a record submitted `minute` minutes after a fixed epoch.
    pub async fn seed_at(&self, status: JobStatus, minute: i64) -> JobRecord {
        let at = Utc.with_ymd_and_hms(2026, 1, 1, 12, 0, 0).unwrap()
            + chrono::Duration::minutes(minute);
        let record = self
            .store
            .inner
            .insert(NewJob::new(serde_json::json!({ "prompt": "a lighthouse" })).submitted_at(at))
            .unwrap();
        if status == JobStatus::Waiting {
            return record;
        }
        let record = JobRecord {
            status,
            remote_id: Some(format!("remote-{}", record.id)),
            ..record
        };
        self.store.inner.update(&record).await.unwrap();
        record
    }

    pub fn admission(&self, policy: BudgetPolicy) -> AdmissionController {
        AdmissionController::new(
            self.mirror.clone(),
            self.store.clone(),
            self.cluster.clone(),
            self.host.clone(),
            self.host.clone(),
            self.host.clone(),
            policy,
            Verbosity::default(),
        )
    }

    pub fn poller(&self, policy: BudgetPolicy, spacing: Duration) -> StatusPoller {
        StatusPoller::new(
            self.mirror.clone(),
            self.store.clone(),
            self.cluster.clone(),
            self.host.clone(),
            self.host.clone(),
            policy,
            spacing,
            Verbosity::default(),
        )
    }
}

/// Same budget for both tiers.
pub fn flat_budget(n: usize) -> BudgetPolicy {
    BudgetPolicy {
        anonymous: n,
        authenticated: n,
    }
}
