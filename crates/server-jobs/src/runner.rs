// crates/server-jobs/src/runner.rs
//! Bounded worker pool that drives Pending jobs to a terminal state.

use std::any::Any;
use std::sync::Arc;
use std::time::{Duration, Instant};

use alphagenome_mcp_types::{JobId, JobStatus};
use chrono::Utc;
use serde_json::Value;
use tokio::sync::{mpsc, Mutex};
use tokio::task::{JoinError, JoinHandle};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::context::JobContext;
use crate::error::WorkError;
use crate::handler::HandlerTable;
use crate::metrics;
use crate::registry::JobRegistry;
use crate::state::JobState;

/// How a work function ended, as seen by the engine.
#[derive(Debug)]
enum Finish {
    Completed(Value),
    Failed(String),
    Cancelled,
}

impl Finish {
    fn from_join(joined: Result<Result<Value, WorkError>, JoinError>) -> Self {
        match joined {
            Ok(Ok(value)) => Finish::Completed(value),
            Ok(Err(WorkError::Cancelled)) => Finish::Cancelled,
            Ok(Err(WorkError::Failed(e))) => Finish::Failed(format!("{e:#}")),
            Err(e) if e.is_panic() => Finish::Failed(format!(
                "work function panicked: {}",
                panic_message(e.into_panic())
            )),
            Err(_) => Finish::Cancelled,
        }
    }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

/// Shared by every worker.
pub(crate) struct Engine {
    pub(crate) registry: Arc<JobRegistry>,
    pub(crate) handlers: Arc<HandlerTable>,
    pub(crate) cancel_grace: Duration,
    /// Tripped by a cancel-all shutdown: workers cancel queued jobs instead of
    /// starting them.
    pub(crate) halt: CancellationToken,
}

/// Spawn `count` workers pulling job ids from `queue`.
///
/// Workers exit once every sender is dropped and the queue is empty.
pub(crate) fn spawn_workers(
    engine: Arc<Engine>,
    queue: mpsc::UnboundedReceiver<JobId>,
    count: usize,
) -> Vec<JoinHandle<()>> {
    let queue = Arc::new(Mutex::new(queue));
    (0..count)
        .map(|worker_id| {
            let engine = Arc::clone(&engine);
            let queue = Arc::clone(&queue);
            tokio::spawn(async move { engine.worker_loop(worker_id, queue).await })
        })
        .collect()
}

impl Engine {
    async fn worker_loop(&self, worker_id: usize, queue: Arc<Mutex<mpsc::UnboundedReceiver<JobId>>>) {
        debug!(worker_id, "Job worker started");
        loop {
            let next = {
                let mut rx = queue.lock().await;
                rx.recv().await
            };
            let Some(job_id) = next else {
                break;
            };
            let Ok(state) = self.registry.get(&job_id) else {
                debug!(worker_id, %job_id, "Queued job no longer exists");
                continue;
            };
            if self.halt.is_cancelled() {
                self.cancel_queued(&state).await;
                continue;
            }
            if self.claim(&state).await {
                self.execute(worker_id, state).await;
            }
        }
        debug!(worker_id, "Job worker stopped");
    }

    /// Pending -> Running. False if the job left Pending while queued.
    async fn claim(&self, state: &JobState) -> bool {
        let claimed = self
            .registry
            .mutate(state, |record| {
                if record.status != JobStatus::Pending {
                    return Ok(false);
                }
                record.mark_running(Utc::now())?;
                Ok(true)
            })
            .await;
        match claimed {
            Ok(claimed) => claimed,
            Err(e) => {
                error!(job_id = %state.id, error = %e, "Failed to start job");
                false
            }
        }
    }

    async fn cancel_queued(&self, state: &JobState) {
        if state.status() != JobStatus::Pending {
            return;
        }
        self.registry
            .append_log(state, "cancelled before start: job manager shutting down")
            .await;
        let cancelled = self
            .registry
            .mutate(state, |record| {
                if record.status != JobStatus::Pending {
                    return Ok(false);
                }
                record.mark_cancelled(Utc::now())?;
                Ok(true)
            })
            .await;
        if let Ok(true) = cancelled {
            state.cancel_token().cancel();
            metrics::record_finished(&state.kind, JobStatus::Cancelled, None);
        }
    }

    async fn execute(&self, worker_id: usize, state: Arc<JobState>) {
        let Some(work) = self.handlers.get(&state.kind) else {
            let message = format!("no work function registered for kind '{}'", state.kind);
            self.finish(&state, Finish::Failed(message), Duration::ZERO).await;
            return;
        };

        info!(worker_id, job_id = %state.id, kind = %state.kind, "Job started");
        metrics::job_started();
        let started = Instant::now();

        let params = state.snapshot().params;
        let ctx = JobContext::new(Arc::clone(&state), Arc::clone(&self.registry));
        let mut task = tokio::spawn(work(ctx, params));

        let returned = tokio::select! {
            joined = &mut task => Some(Finish::from_join(joined)),
            _ = state.cancel_token().cancelled() => None,
        };
        let finish = match returned {
            Some(finish) => finish,
            None => match tokio::time::timeout(self.cancel_grace, &mut task).await {
                Ok(joined) => Finish::from_join(joined),
                Err(_) => self.force_stop(&state, task).await,
            },
        };

        metrics::job_stopped();
        self.finish(&state, finish, started.elapsed()).await;
    }

    /// Give up on a work function that ignored cancellation.
    ///
    /// The job is recorded Cancelled without waiting for the task: code that
    /// never yields cannot be aborted, so the handle is reaped elsewhere.
    async fn force_stop(&self, state: &JobState, task: JoinHandle<Result<Value, WorkError>>) -> Finish {
        task.abort();
        let grace_ms = self.cancel_grace.as_millis() as u64;
        warn!(
            job_id = %state.id,
            grace_ms,
            "Work function ignored cancellation; terminated"
        );
        self.registry
            .append_log(
                state,
                format!("forcibly terminated: did not stop within {grace_ms}ms of cancellation"),
            )
            .await;

        let job_id = state.id;
        tokio::spawn(async move {
            match task.await {
                Err(e) if e.is_panic() => {
                    debug!(%job_id, "Terminated work function panicked after cancellation")
                }
                _ => debug!(%job_id, "Terminated work function exited"),
            }
        });
        Finish::Cancelled
    }

    /// Running -> terminal, recording the outcome.
    async fn finish(&self, state: &JobState, finish: Finish, elapsed: Duration) {
        let failure = match &finish {
            Finish::Failed(message) => Some(message.clone()),
            _ => None,
        };
        let applied = self
            .registry
            .mutate(state, |record| {
                let now = Utc::now();
                match finish {
                    Finish::Completed(value) => record.mark_completed(value, now)?,
                    Finish::Failed(message) => record.mark_failed(message, now)?,
                    Finish::Cancelled => record.mark_cancelled(now)?,
                }
                Ok(record.status)
            })
            .await;

        match applied {
            Ok(status) => {
                metrics::record_finished(&state.kind, status, Some(elapsed));
                match failure {
                    Some(error) => warn!(
                        job_id = %state.id,
                        kind = %state.kind,
                        elapsed_ms = elapsed.as_millis() as u64,
                        %error,
                        "Job failed"
                    ),
                    None => info!(
                        job_id = %state.id,
                        kind = %state.kind,
                        %status,
                        elapsed_ms = elapsed.as_millis() as u64,
                        "Job finished"
                    ),
                }
            }
            Err(e) => error!(job_id = %state.id, error = %e, "Failed to record job outcome"),
        }
    }
}
