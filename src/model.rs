//! Core data model.
//!
//! A job record is one generation request as the client tracks it: created
//! locally as `Waiting`, admitted to the remote cluster, polled until it
//! settles as `Done` or `Errored`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{Error, Result};

// ---------------------------------------------------------------------------
// Job Record
// ---------------------------------------------------------------------------

/// A generation request tracked by the controller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobRecord {
    /// Local identifier, assigned before the job is ever submitted.
    pub id: JobId,

    /// Identifier assigned by the remote cluster on admission.
    pub remote_id: Option<String>,

    /// Current lifecycle status.
    pub status: JobStatus,

    /// Submission payload. Owned by the caller; the controller never edits it.
    pub params: serde_json::Value,

    /// Position in the remote queue, as last reported.
    pub queue_position: Option<u32>,

    /// Remote's estimate of seconds until the job finishes.
    pub wait_time_secs: Option<u32>,

    /// Failure detail reported by the remote for `Errored` jobs.
    pub error_message: Option<String>,

    /// When the request was created. Waiting jobs are admitted oldest first.
    pub submitted_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl JobRecord {
    /// Whether the remote-visible fields of `other` differ from `self`.
    ///
    /// `updated_at` is ignored so a status check that reports nothing new
    /// does not cause a store write.
    pub fn differs_from(&self, other: &JobRecord) -> bool {
        self.status != other.status
            || self.remote_id != other.remote_id
            || self.queue_position != other.queue_position
            || self.wait_time_secs != other.wait_time_secs
            || self.error_message != other.error_message
    }
}

/// Newtype for job IDs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct JobId(pub Uuid);

impl JobId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl std::fmt::Display for JobId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Short display: first 8 chars of UUID
        write!(f, "{}", &self.0.to_string()[..8])
    }
}

impl Default for JobId {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// Status
// ---------------------------------------------------------------------------

/// Lifecycle status of a job. Only ever moves forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    /// Created locally, not yet submitted to the cluster.
    Waiting,
    /// Accepted by the cluster, waiting for a worker.
    Queued,
    /// A cluster worker is generating the artifact.
    Processing,
    /// Artifact is ready. Terminal.
    Done,
    /// The cluster gave up on the job. Terminal.
    Errored,
}

impl JobStatus {
    /// Can transition from self to `to`?
    ///
    /// Staying put is allowed; skipping ahead is allowed (a fast job may go
    /// straight from `Queued` to `Done` between two polls).
    pub fn can_transition_to(self, to: JobStatus) -> bool {
        use JobStatus::*;
        if self == to {
            return true;
        }
        match self {
            Waiting => true,
            Queued => matches!(to, Processing | Done | Errored),
            Processing => matches!(to, Done | Errored),
            Done | Errored => false,
        }
    }

    /// Validate a transition, returning an error if it would move backwards.
    pub fn ensure_transition(self, to: JobStatus) -> Result<()> {
        if self.can_transition_to(to) {
            Ok(())
        } else {
            Err(Error::InvalidTransition { from: self, to })
        }
    }

    /// Is this a terminal status?
    pub fn is_terminal(self) -> bool {
        matches!(self, JobStatus::Done | JobStatus::Errored)
    }

    /// Counts against the concurrency budget.
    pub fn is_active(self) -> bool {
        matches!(self, JobStatus::Queued | JobStatus::Processing)
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            JobStatus::Waiting => "waiting",
            JobStatus::Queued => "queued",
            JobStatus::Processing => "processing",
            JobStatus::Done => "done",
            JobStatus::Errored => "errored",
        };
        write!(f, "{s}")
    }
}

// ---------------------------------------------------------------------------
// Builder
// ---------------------------------------------------------------------------

/// Builder for new waiting jobs. Stores turn these into [`JobRecord`]s.
#[derive(Debug, Clone)]
pub struct NewJob {
    pub(crate) params: serde_json::Value,
    pub(crate) submitted_at: Option<DateTime<Utc>>,
}

impl NewJob {
    pub fn new(params: serde_json::Value) -> Self {
        Self {
            params,
            submitted_at: None,
        }
    }

    /// Override the creation time (defaults to now).
    pub fn submitted_at(mut self, at: DateTime<Utc>) -> Self {
        self.submitted_at = Some(at);
        self
    }

    /// Materialize the waiting record.
    pub fn into_record(self) -> JobRecord {
        let now = Utc::now();
        JobRecord {
            id: JobId::new(),
            remote_id: None,
            status: JobStatus::Waiting,
            params: self.params,
            queue_position: None,
            wait_time_secs: None,
            error_message: None,
            submitted_at: self.submitted_at.unwrap_or(now),
            updated_at: now,
        }
    }
}
