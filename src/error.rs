//! Error types for jobgate.

use thiserror::Error;

use crate::model::{JobId, JobStatus};

#[derive(Debug, Error)]
pub enum Error {
    #[error("submission failed for job {job_id}: {reason}")]
    Submission { job_id: JobId, reason: String },

    #[error("status check failed for job {job_id}: {reason}")]
    Poll { job_id: JobId, reason: String },

    #[error("store read failed: {0}")]
    StoreRead(String),

    #[error("store write failed: {0}")]
    StoreWrite(String),

    #[error("job not found: {0}")]
    NotFound(JobId),

    #[error("invalid status transition: {from} -> {to}")]
    InvalidTransition { from: JobStatus, to: JobStatus },

    #[error("configuration error: {0}")]
    Config(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Other(String),
}

pub type Result<T> = std::result::Result<T, Error>;
