// crates/server-jobs/src/error.rs
//! Error types surfaced by the job manager and by work functions.

use alphagenome_mcp_db::DbError;
use alphagenome_mcp_types::{JobId, TransitionError};
use thiserror::Error;

/// Errors returned by [`JobManager`](crate::JobManager) operations.
#[derive(Debug, Error)]
pub enum JobError {
    #[error("job not found: {0}")]
    NotFound(JobId),

    #[error("unknown job kind: {0}")]
    InvalidKind(String),

    #[error("job manager is shutting down and no longer accepts submissions")]
    ShuttingDown,

    #[error("job store failure: {0}")]
    Storage(#[from] DbError),

    #[error(transparent)]
    Transition(#[from] TransitionError),
}

pub type JobResult<T> = Result<T, JobError>;

/// How a work function ends other than by returning a result.
#[derive(Debug, Error)]
pub enum WorkError {
    /// The work function observed a cancellation request and stopped.
    #[error("cancelled")]
    Cancelled,

    /// The work function failed. The message (with its context chain) becomes
    /// the job's `error`.
    #[error("{0:#}")]
    Failed(#[from] anyhow::Error),
}

impl WorkError {
    /// Shorthand for a failure carrying only a message.
    pub fn msg(message: impl std::fmt::Display) -> Self {
        WorkError::Failed(anyhow::anyhow!("{message}"))
    }
}

/// Rejected handler registration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistrationError {
    #[error("job kind must not be empty")]
    EmptyKind,

    #[error("job kind already registered: {0}")]
    Duplicate(String),
}
