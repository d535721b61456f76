// crates/server-jobs/src/manager.rs
//! The job manager: submit, observe and cancel long-running work.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use alphagenome_mcp_db::Database;
use alphagenome_mcp_types::{
    CancelAck, CancelOutcome, JobId, JobLog, JobOutcome, JobStatus, JobStatusView, JobSummary,
};
use chrono::Utc;
use serde_json::Value;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::config::{JobManagerConfig, RetentionPolicy, ShutdownMode};
use crate::error::{JobError, JobResult};
use crate::handler::HandlerTable;
use crate::metrics;
use crate::registry::JobRegistry;
use crate::runner::{spawn_workers, Engine};
use crate::state::JobState;

const INTERRUPTED: &str = "interrupted: process exited while job was running";

/// Owns the job table, the worker pool and the retention sweeper.
///
/// Constructed once with [`JobManager::start`] and shared by `Arc`. Every
/// query method reads published snapshots and returns without waiting on
/// any work function.
pub struct JobManager {
    registry: Arc<JobRegistry>,
    handlers: Arc<HandlerTable>,
    config: JobManagerConfig,
    /// `None` once shutdown has begun.
    queue: Mutex<Option<mpsc::UnboundedSender<JobId>>>,
    halt: CancellationToken,
    workers: tokio::sync::Mutex<Vec<JoinHandle<()>>>,
    sweeper: Mutex<Option<JoinHandle<()>>>,
}

impl JobManager {
    /// Load persisted jobs, recover interrupted ones and spawn the workers.
    pub async fn start(
        db: Database,
        handlers: HandlerTable,
        config: JobManagerConfig,
    ) -> JobResult<Arc<Self>> {
        let registry = Arc::new(JobRegistry::new(db));
        let handlers = Arc::new(handlers);
        let restored = registry.restore().await?;
        let (tx, rx) = mpsc::unbounded_channel();

        let mut resumed = 0usize;
        for state in &restored {
            if recover(&registry, &handlers, &config, state).await && tx.send(state.id).is_ok() {
                resumed += 1;
            }
        }

        let halt = CancellationToken::new();
        let engine = Arc::new(Engine {
            registry: Arc::clone(&registry),
            handlers: Arc::clone(&handlers),
            cancel_grace: config.cancel_grace,
            halt: halt.clone(),
        });
        let workers = spawn_workers(engine, rx, config.worker_count());

        let sweeper = match config.retention {
            RetentionPolicy::MaxAge(max_age) => Some(spawn_sweeper(
                Arc::clone(&registry),
                max_age,
                config.sweep_interval,
            )),
            RetentionPolicy::KeepForever => None,
        };

        info!(
            workers = workers.len(),
            restored = restored.len(),
            resumed,
            kinds = ?handlers.kinds(),
            "Job manager started"
        );

        Ok(Arc::new(Self {
            registry,
            handlers,
            config,
            queue: Mutex::new(Some(tx)),
            halt,
            workers: tokio::sync::Mutex::new(workers),
            sweeper: Mutex::new(sweeper),
        }))
    }

    fn sender(&self) -> Option<mpsc::UnboundedSender<JobId>> {
        match self.queue.lock() {
            Ok(queue) => queue.clone(),
            Err(e) => {
                tracing::error!("Mutex poisoned reading job queue: {e}");
                e.into_inner().clone()
            }
        }
    }

    /// Create a Pending job and queue it for execution.
    ///
    /// Returns once the job is durably recorded, never waiting for it to run.
    /// If the workers are already gone the job is recorded and then cancelled
    /// with the reason in its log; its id is still returned so the caller can
    /// see that outcome.
    pub async fn submit(
        &self,
        kind: &str,
        params: Value,
        name: Option<String>,
    ) -> JobResult<JobId> {
        if !self.handlers.contains(kind) {
            return Err(JobError::InvalidKind(kind.to_string()));
        }
        let queue = self.sender().ok_or(JobError::ShuttingDown)?;

        let state = self.registry.create(kind, name, params).await?;
        metrics::record_submitted(kind);
        info!(job_id = %state.id, kind, "Job submitted");

        if queue.send(state.id).is_err() {
            // Workers are gone; the job can never run.
            warn!(job_id = %state.id, "Job queue closed during submit; cancelling job");
            cancel_with_reason(&self.registry, &state, "cancelled before start: job manager shut down")
                .await;
        }
        Ok(state.id)
    }

    pub fn status(&self, id: &JobId) -> JobResult<JobStatusView> {
        let state = self.registry.get(id)?;
        let record = state.snapshot();
        Ok(JobStatusView::new(
            &record,
            state.log_len(),
            state.last_log_line(),
        ))
    }

    /// The job's result, its failure, or `NotReady` while it is unfinished.
    pub fn result(&self, id: &JobId) -> JobResult<JobOutcome> {
        let state = self.registry.get(id)?;
        Ok(JobOutcome::from_record(&state.snapshot()))
    }

    /// The last `tail` log lines, or all of them when `tail` is `None` or 0.
    pub fn log(&self, id: &JobId, tail: Option<usize>) -> JobResult<JobLog> {
        let state = self.registry.get(id)?;
        let status = state.status();
        let (lines, total_lines) = state.log_tail(tail);
        Ok(JobLog {
            job_id: *id,
            status,
            lines,
            total_lines,
        })
    }

    /// Request cancellation.
    ///
    /// A Pending job is cancelled on the spot. A Running job is asked to stop
    /// and is terminated once `cancel_grace` runs out. A terminal job is left
    /// as it is.
    pub async fn cancel(&self, id: &JobId) -> JobResult<CancelAck> {
        let state = self.registry.get(id)?;
        let outcome = request_cancel(&self.registry, &state).await?;
        match outcome {
            CancelOutcome::CancelledBeforeStart => {
                info!(job_id = %id, "Pending job cancelled");
                metrics::record_finished(&state.kind, JobStatus::Cancelled, None);
            }
            CancelOutcome::CancellationRequested => {
                info!(job_id = %id, "Cancellation requested for running job")
            }
            CancelOutcome::AlreadyTerminal => {}
        }
        Ok(CancelAck {
            job_id: *id,
            status: state.status(),
            outcome,
        })
    }

    /// Summaries in submission order, optionally restricted to one status.
    pub fn list(&self, status: Option<JobStatus>) -> Vec<JobSummary> {
        self.registry
            .snapshots(status)
            .iter()
            .map(JobSummary::from)
            .collect()
    }

    /// Registered job kinds, sorted.
    pub fn kinds(&self) -> Vec<String> {
        self.handlers.kinds()
    }

    pub fn config(&self) -> &JobManagerConfig {
        &self.config
    }

    pub fn is_accepting(&self) -> bool {
        self.sender().is_some()
    }

    /// Run one retention sweep now. Returns the number of purged jobs.
    ///
    /// A no-op under `RetentionPolicy::KeepForever`.
    pub async fn purge_expired(&self) -> JobResult<usize> {
        match self.config.retention {
            RetentionPolicy::MaxAge(max_age) => purge_older_than(&self.registry, max_age).await,
            RetentionPolicy::KeepForever => Ok(0),
        }
    }

    /// Stop accepting submissions and wait for every worker to exit.
    ///
    /// Calling it again after the first call returns immediately.
    pub async fn shutdown(&self, mode: ShutdownMode) {
        let sender = match self.queue.lock() {
            Ok(mut queue) => queue.take(),
            Err(e) => e.into_inner().take(),
        };
        if sender.is_none() {
            return;
        }
        info!(?mode, "Job manager shutting down");

        if mode == ShutdownMode::CancelAll {
            self.halt.cancel();
            for state in self.registry.unfinished() {
                cancel_with_reason(&self.registry, &state, "cancelled: job manager shutting down")
                    .await;
            }
        }
        // Dropping the last sender lets workers exit once the queue is empty.
        drop(sender);

        let sweeper = match self.sweeper.lock() {
            Ok(mut sweeper) => sweeper.take(),
            Err(e) => e.into_inner().take(),
        };
        if let Some(sweeper) = sweeper {
            sweeper.abort();
        }

        let workers: Vec<JoinHandle<()>> = std::mem::take(&mut *self.workers.lock().await);
        for worker in workers {
            if let Err(e) = worker.await {
                warn!(error = %e, "Job worker exited abnormally");
            }
        }
        info!("Job manager stopped");
    }
}

impl std::fmt::Debug for JobManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JobManager")
            .field("jobs", &self.registry.len())
            .field("handlers", &self.handlers)
            .field("config", &self.config)
            .finish()
    }
}

/// Set the cancel flag, cancelling a Pending job outright, and trip the
/// job's cancellation token.
async fn request_cancel(registry: &JobRegistry, state: &JobState) -> JobResult<CancelOutcome> {
    let outcome = registry
        .mutate(state, |record| {
            if record.is_terminal() {
                return Ok(CancelOutcome::AlreadyTerminal);
            }
            record.request_cancel()?;
            if record.status == JobStatus::Pending {
                record.mark_cancelled(Utc::now())?;
                Ok(CancelOutcome::CancelledBeforeStart)
            } else {
                Ok(CancelOutcome::CancellationRequested)
            }
        })
        .await?;
    if outcome != CancelOutcome::AlreadyTerminal {
        state.cancel_token().cancel();
    }
    Ok(outcome)
}

/// Log `reason`, then cancel the job the same way [`JobManager::cancel`] does.
async fn cancel_with_reason(registry: &JobRegistry, state: &JobState, reason: &str) {
    registry.append_log(state, reason).await;
    match request_cancel(registry, state).await {
        Ok(CancelOutcome::CancelledBeforeStart) => {
            metrics::record_finished(&state.kind, JobStatus::Cancelled, None);
        }
        Ok(_) => {}
        Err(e) => warn!(job_id = %state.id, error = %e, "Failed to cancel job"),
    }
}

/// Bring one restored job back to a consistent state. Returns true if it
/// should be queued for execution.
async fn recover(
    registry: &JobRegistry,
    handlers: &HandlerTable,
    config: &JobManagerConfig,
    state: &JobState,
) -> bool {
    let record = state.snapshot();
    match record.status {
        JobStatus::Running => {
            let outcome = if record.cancel_requested {
                registry
                    .append_log(state, "cancelled: process exited while cancellation was pending")
                    .await;
                registry.mutate(state, |r| r.mark_cancelled(Utc::now())).await
            } else {
                registry.append_log(state, INTERRUPTED).await;
                registry
                    .mutate(state, |r| r.mark_failed(INTERRUPTED, Utc::now()))
                    .await
            };
            match outcome {
                Ok(()) => warn!(job_id = %state.id, kind = %state.kind, "Recovered interrupted job"),
                Err(e) => warn!(job_id = %state.id, error = %e, "Failed to recover interrupted job"),
            }
            false
        }
        JobStatus::Pending if !handlers.contains(&record.kind) => {
            let reason = format!(
                "cancelled at startup: no work function registered for kind '{}'",
                record.kind
            );
            warn!(job_id = %state.id, kind = %state.kind, "Pending job has unknown kind");
            cancel_with_reason(registry, state, &reason).await;
            false
        }
        JobStatus::Pending if record.cancel_requested || !config.resume_pending => {
            cancel_with_reason(registry, state, "cancelled at startup: pending jobs are not resumed")
                .await;
            false
        }
        JobStatus::Pending => true,
        JobStatus::Completed | JobStatus::Failed | JobStatus::Cancelled => false,
    }
}

async fn purge_older_than(registry: &JobRegistry, max_age: Duration) -> JobResult<usize> {
    let Ok(max_age) = chrono::Duration::from_std(max_age) else {
        return Ok(0);
    };
    let Some(cutoff) = Utc::now().checked_sub_signed(max_age) else {
        return Ok(0);
    };
    let mut purged = 0;
    for id in registry.expired(cutoff) {
        if registry.remove(&id).await? {
            purged += 1;
        }
    }
    if purged > 0 {
        info!(purged, "Purged expired jobs");
    }
    Ok(purged)
}

fn spawn_sweeper(
    registry: Arc<JobRegistry>,
    max_age: Duration,
    every: Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(every.max(Duration::from_millis(10)));
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            if let Err(e) = purge_older_than(&registry, max_age).await {
                warn!(error = %e, "Retention sweep failed");
            }
        }
    })
}
