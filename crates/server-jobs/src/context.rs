// crates/server-jobs/src/context.rs
//! Handle given to a running work function.

use std::sync::Arc;

use alphagenome_mcp_types::JobId;

use crate::error::WorkError;
use crate::registry::JobRegistry;
use crate::state::JobState;

/// A running job's view of itself: its identity, its cancellation signal,
/// and its log.
///
/// Cheap to clone; clones refer to the same job.
#[derive(Clone)]
pub struct JobContext {
    state: Arc<JobState>,
    registry: Arc<JobRegistry>,
}

impl JobContext {
    pub(crate) fn new(state: Arc<JobState>, registry: Arc<JobRegistry>) -> Self {
        Self { state, registry }
    }

    pub fn job_id(&self) -> JobId {
        self.state.id
    }

    pub fn kind(&self) -> &str {
        &self.state.kind
    }

    /// Whether cancellation of this job has been requested.
    pub fn is_cancelled(&self) -> bool {
        self.state.cancel_token().is_cancelled()
    }

    /// Resolves once cancellation is requested. Use with `tokio::select!` to
    /// abandon long awaits.
    pub async fn cancelled(&self) {
        self.state.cancel_token().cancelled().await
    }

    /// `Err(WorkError::Cancelled)` if cancellation has been requested.
    ///
    /// Call between units of work and propagate with `?`.
    pub fn checkpoint(&self) -> Result<(), WorkError> {
        if self.is_cancelled() {
            Err(WorkError::Cancelled)
        } else {
            Ok(())
        }
    }

    /// Append a line to the job's log. Returns false if the line was dropped
    /// because the job already reached a terminal state.
    pub async fn log(&self, line: impl Into<String>) -> bool {
        self.registry.append_log(&self.state, line).await
    }
}

impl std::fmt::Debug for JobContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JobContext")
            .field("job_id", &self.state.id)
            .field("kind", &self.state.kind)
            .finish()
    }
}
