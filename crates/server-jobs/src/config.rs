// crates/server-jobs/src/config.rs
//! Runtime knobs for the job manager.

use std::time::Duration;

/// Default number of jobs allowed to run at once.
pub const DEFAULT_MAX_CONCURRENCY: usize = 4;
/// Default time a running job gets to honor a cancellation request.
pub const DEFAULT_CANCEL_GRACE: Duration = Duration::from_secs(5);
/// Default period of the retention sweeper.
pub const DEFAULT_SWEEP_INTERVAL: Duration = Duration::from_secs(300);

#[derive(Debug, Clone)]
pub struct JobManagerConfig {
    /// Upper bound on concurrently Running jobs. Values below 1 are treated as 1.
    pub max_concurrency: usize,
    /// After a cancellation request, how long a running work function may keep
    /// going before it is forcibly stopped.
    pub cancel_grace: Duration,
    pub retention: RetentionPolicy,
    /// How often expired terminal jobs are purged. Ignored under `KeepForever`.
    pub sweep_interval: Duration,
    /// Re-enqueue jobs found Pending in the store at startup. When false they
    /// are cancelled instead.
    pub resume_pending: bool,
}

impl Default for JobManagerConfig {
    fn default() -> Self {
        Self {
            max_concurrency: DEFAULT_MAX_CONCURRENCY,
            cancel_grace: DEFAULT_CANCEL_GRACE,
            retention: RetentionPolicy::KeepForever,
            sweep_interval: DEFAULT_SWEEP_INTERVAL,
            resume_pending: true,
        }
    }
}

impl JobManagerConfig {
    pub(crate) fn worker_count(&self) -> usize {
        self.max_concurrency.max(1)
    }
}

/// How long terminal jobs are kept.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RetentionPolicy {
    #[default]
    KeepForever,
    /// Purge terminal jobs whose `completed_at` is older than this.
    MaxAge(Duration),
}

/// What happens to unfinished work on shutdown.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ShutdownMode {
    /// Stop accepting submissions, then run every queued job to completion.
    Drain,
    /// Stop accepting submissions, cancel every non-terminal job, then wait
    /// for running jobs to stop (forcibly after the cancel grace period).
    #[default]
    CancelAll,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = JobManagerConfig::default();
        assert_eq!(config.max_concurrency, 4);
        assert_eq!(config.cancel_grace, Duration::from_secs(5));
        assert_eq!(config.retention, RetentionPolicy::KeepForever);
        assert!(config.resume_pending);
    }

    #[test]
    fn test_zero_concurrency_still_runs_one_worker() {
        let config = JobManagerConfig {
            max_concurrency: 0,
            ..Default::default()
        };
        assert_eq!(config.worker_count(), 1);
    }
}
