//! Concurrency budget and active-set selection.

use crate::host::Identity;
use crate::model::{JobRecord, JobStatus};

/// Per-tier limit on jobs concurrently `Queued` or `Processing`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BudgetPolicy {
    pub anonymous: usize,
    pub authenticated: usize,
}

impl Default for BudgetPolicy {
    fn default() -> Self {
        Self {
            anonymous: 2,
            authenticated: 5,
        }
    }
}

impl BudgetPolicy {
    /// Budget for the caller's current identity.
    ///
    /// Identity is read exactly once per call, so a mid-session sign-in
    /// takes effect on the next admission attempt and a single attempt
    /// never mixes tiers.
    pub fn current(&self, identity: &dyn Identity) -> usize {
        if identity.is_authenticated() {
            self.authenticated
        } else {
            self.anonymous
        }
    }
}

/// The jobs that currently count against the budget.
#[derive(Debug, Clone, Default)]
pub struct ActiveSet {
    /// At most `budget` records: the tail of processing-then-queued.
    pub jobs: Vec<JobRecord>,
    /// How many processing + queued records existed before truncation.
    pub untruncated_len: usize,
}

impl ActiveSet {
    /// Whether another job may be admitted under `budget`.
    pub fn has_headroom(&self, budget: usize) -> bool {
        self.untruncated_len < budget
    }
}

/// Partition into processing and queued, concatenate processing first, and
/// keep the last `budget` entries.
///
/// When the combined count exceeds the budget, the earliest processing jobs
/// fall off the front and queued jobs are kept in preference to them.
pub fn select_active(mirror: &[JobRecord], budget: usize) -> ActiveSet {
    let with_status = |status: JobStatus| {
        mirror
            .iter()
            .filter(move |r| r.status == status)
            .cloned()
    };

    let mut jobs: Vec<JobRecord> = with_status(JobStatus::Processing)
        .chain(with_status(JobStatus::Queued))
        .collect();

    let untruncated_len = jobs.len();
    jobs.drain(..untruncated_len.saturating_sub(budget));

    ActiveSet {
        jobs,
        untruncated_len,
    }
}
