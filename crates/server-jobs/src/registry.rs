// crates/server-jobs/src/registry.rs
//! Authoritative table of jobs: store-backed, published in memory.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, RwLock};

use alphagenome_mcp_db::Database;
use alphagenome_mcp_types::{JobId, JobRecord, JobStatus, TransitionError};
use chrono::{DateTime, Utc};
use serde_json::Value;

use crate::error::{JobError, JobResult};
use crate::metrics;
use crate::state::JobState;

/// Every job the manager knows about.
///
/// Mutations follow one order: take the job's mutation lock, write the store,
/// then publish the new snapshot. Readers only ever see published snapshots.
pub(crate) struct JobRegistry {
    db: Database,
    jobs: RwLock<HashMap<JobId, Arc<JobState>>>,
    /// Last allocated submission sequence number. Guards id allocation.
    last_seq: Mutex<u64>,
}

impl JobRegistry {
    pub(crate) fn new(db: Database) -> Self {
        Self {
            db,
            jobs: RwLock::new(HashMap::new()),
            last_seq: Mutex::new(0),
        }
    }

    /// Load every persisted job and its log. Returns the restored jobs in
    /// submission order.
    pub(crate) async fn restore(&self) -> JobResult<Vec<Arc<JobState>>> {
        let records = self.db.list_jobs(None).await?;
        let mut logs = self.db.load_all_job_logs().await?;
        let next_line_nos = self.db.next_log_line_nos().await?;
        let max_seq = self.db.max_job_seq().await?;

        let restored: Vec<Arc<JobState>> = records
            .into_iter()
            .map(|record| {
                let log = logs.remove(&record.id).unwrap_or_default();
                let next_line_no = next_line_nos.get(&record.id).copied().unwrap_or(0);
                Arc::new(JobState::new(record, log).resume_log_at(next_line_no))
            })
            .collect();

        match self.last_seq.lock() {
            Ok(mut last) => *last = (*last).max(max_seq),
            Err(e) => tracing::error!("Mutex poisoned restoring job sequence: {e}"),
        }
        match self.jobs.write() {
            Ok(mut jobs) => {
                for state in &restored {
                    jobs.insert(state.id, Arc::clone(state));
                }
            }
            Err(e) => tracing::error!("RwLock poisoned writing jobs map: {e}"),
        }
        Ok(restored)
    }

    /// Allocate a fresh id and the next sequence number.
    fn allocate(&self) -> (JobId, u64) {
        let mut last = self.last_seq.lock().unwrap_or_else(|e| {
            tracing::error!("Mutex poisoned allocating job id: {e}");
            e.into_inner()
        });
        *last += 1;
        let seq = *last;
        let id = loop {
            let candidate = JobId::new();
            if self.lookup(&candidate).is_none() {
                break candidate;
            }
        };
        (id, seq)
    }

    /// Persist a new Pending job, then make it visible.
    ///
    /// A job is never visible to readers unless its record is in the store.
    pub(crate) async fn create(
        &self,
        kind: &str,
        name: Option<String>,
        params: Value,
    ) -> JobResult<Arc<JobState>> {
        let (id, seq) = self.allocate();
        let record = JobRecord::new(id, seq, kind, name, params, Utc::now());
        self.db.insert_job(&record).await.inspect_err(|e| {
            tracing::error!(job_id = %id, kind, error = %e, "Failed to persist submitted job");
            metrics::record_storage_failure("insert_job");
        })?;

        let state = Arc::new(JobState::new(record, Vec::new()));
        match self.jobs.write() {
            Ok(mut jobs) => {
                jobs.insert(id, Arc::clone(&state));
            }
            Err(e) => {
                tracing::error!("RwLock poisoned writing jobs map: {e}");
                e.into_inner().insert(id, Arc::clone(&state));
            }
        }
        Ok(state)
    }

    fn lookup(&self, id: &JobId) -> Option<Arc<JobState>> {
        match self.jobs.read() {
            Ok(jobs) => jobs.get(id).cloned(),
            Err(e) => {
                tracing::error!("RwLock poisoned reading jobs map: {e}");
                e.into_inner().get(id).cloned()
            }
        }
    }

    pub(crate) fn get(&self, id: &JobId) -> JobResult<Arc<JobState>> {
        self.lookup(id).ok_or(JobError::NotFound(*id))
    }

    fn all(&self) -> Vec<Arc<JobState>> {
        match self.jobs.read() {
            Ok(jobs) => jobs.values().cloned().collect(),
            Err(e) => {
                tracing::error!("RwLock poisoned reading jobs: {e}");
                e.into_inner().values().cloned().collect()
            }
        }
    }

    /// Snapshots in submission order, optionally restricted to one status.
    pub(crate) fn snapshots(&self, filter: Option<JobStatus>) -> Vec<JobRecord> {
        let states = self.all();
        let mut records: Vec<JobRecord> = states
            .iter()
            .map(|state| state.snapshot())
            .filter(|record| filter.map_or(true, |status| record.status == status))
            .collect();
        records.sort_by_key(|record| record.seq);
        records
    }

    /// Every job that is not yet terminal.
    pub(crate) fn unfinished(&self) -> Vec<Arc<JobState>> {
        let mut states: Vec<Arc<JobState>> = self
            .all()
            .into_iter()
            .filter(|state| !state.status().is_terminal())
            .collect();
        states.sort_by_key(|state| state.seq());
        states
    }

    /// Apply `change` to a copy of the job's record, persist it, then publish.
    ///
    /// `change` sees the current published record and may refuse by returning
    /// an error, in which case nothing is written. A store failure is logged
    /// and the snapshot is published anyway; the next full-row write of the
    /// same job brings the store back in line.
    pub(crate) async fn mutate<T>(
        &self,
        state: &JobState,
        change: impl FnOnce(&mut JobRecord) -> Result<T, TransitionError>,
    ) -> Result<T, TransitionError> {
        let _guard = state.lock_mutations().await;
        let current = state.snapshot();
        let mut next = current.clone();
        let out = change(&mut next)?;
        if next != current {
            if let Err(e) = self.db.update_job(&next).await {
                tracing::warn!(
                    job_id = %state.id,
                    status = %next.status,
                    error = %e,
                    "Failed to persist job update; keeping in-memory state"
                );
                metrics::record_storage_failure("update_job");
            }
            state.publish(next);
        }
        Ok(out)
    }

    /// Append one line to a job's log. Lines arriving after the job is
    /// terminal are dropped; returns whether the line was kept.
    pub(crate) async fn append_log(&self, state: &JobState, line: impl Into<String>) -> bool {
        let line = line.into();
        let _guard = state.lock_mutations().await;
        if state.status().is_terminal() {
            tracing::debug!(job_id = %state.id, "Dropping log line for terminal job");
            return false;
        }
        let line_no = state.next_line_no();
        if let Err(e) = self.db.append_job_log(&state.id, line_no, &line).await {
            tracing::warn!(
                job_id = %state.id,
                line_no,
                error = %e,
                "Failed to persist job log line; keeping in-memory log"
            );
            metrics::record_storage_failure("append_job_log");
        }
        state.push_log_line(line);
        true
    }

    /// Terminal jobs that finished before `cutoff`.
    pub(crate) fn expired(&self, cutoff: DateTime<Utc>) -> Vec<JobId> {
        self.snapshots(None)
            .into_iter()
            .filter(|record| {
                record.is_terminal() && record.completed_at.is_some_and(|at| at < cutoff)
            })
            .map(|record| record.id)
            .collect()
    }

    /// Delete a job from the store and forget it. Returns whether it existed.
    pub(crate) async fn remove(&self, id: &JobId) -> JobResult<bool> {
        let existed = self.db.delete_job(id).await?;
        let removed = match self.jobs.write() {
            Ok(mut jobs) => jobs.remove(id).is_some(),
            Err(e) => {
                tracing::error!("RwLock poisoned writing jobs map: {e}");
                e.into_inner().remove(id).is_some()
            }
        };
        Ok(existed || removed)
    }

    pub(crate) fn len(&self) -> usize {
        match self.jobs.read() {
            Ok(jobs) => jobs.len(),
            Err(e) => e.into_inner().len(),
        }
    }
}
