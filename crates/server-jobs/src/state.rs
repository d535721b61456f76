// crates/server-jobs/src/state.rs
//! In-memory state for a single job.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use alphagenome_mcp_types::{JobId, JobRecord, JobStatus};
use tokio::sync::{Mutex, MutexGuard};
use tokio_util::sync::CancellationToken;

/// Published snapshot of one job plus the primitives that serialize its
/// mutations.
///
/// Readers take the `RwLock`s only long enough to clone, so status queries
/// never wait on a store write. Writers hold `write_lock` across
/// persist-then-publish, so at most one mutation of a job is in flight.
pub(crate) struct JobState {
    pub(crate) id: JobId,
    pub(crate) kind: String,
    record: RwLock<JobRecord>,
    log: RwLock<Vec<String>>,
    /// Store position of the next log line. Runs ahead of `log.len()` once an
    /// append has failed to persist, so later lines never reuse a position.
    next_line_no: AtomicUsize,
    write_lock: Mutex<()>,
    cancel: CancellationToken,
}

impl JobState {
    pub(crate) fn new(record: JobRecord, log: Vec<String>) -> Self {
        let cancel = CancellationToken::new();
        if record.cancel_requested {
            cancel.cancel();
        }
        Self {
            id: record.id,
            kind: record.kind.clone(),
            record: RwLock::new(record),
            next_line_no: AtomicUsize::new(log.len()),
            log: RwLock::new(log),
            write_lock: Mutex::new(()),
            cancel,
        }
    }

    /// Continue the stored log at `next_line_no` rather than at the number of
    /// lines that were reloaded.
    pub(crate) fn resume_log_at(self, next_line_no: usize) -> Self {
        self.next_line_no.fetch_max(next_line_no, Ordering::SeqCst);
        self
    }

    fn read_record(&self) -> RwLockReadGuard<'_, JobRecord> {
        self.record.read().unwrap_or_else(|e| {
            tracing::error!(job_id = %self.id, "RwLock poisoned reading job record: {e}");
            e.into_inner()
        })
    }

    fn read_log(&self) -> RwLockReadGuard<'_, Vec<String>> {
        self.log.read().unwrap_or_else(|e| {
            tracing::error!(job_id = %self.id, "RwLock poisoned reading job log: {e}");
            e.into_inner()
        })
    }

    fn write_log(&self) -> RwLockWriteGuard<'_, Vec<String>> {
        self.log.write().unwrap_or_else(|e| {
            tracing::error!(job_id = %self.id, "RwLock poisoned writing job log: {e}");
            e.into_inner()
        })
    }

    pub(crate) fn snapshot(&self) -> JobRecord {
        self.read_record().clone()
    }

    pub(crate) fn status(&self) -> JobStatus {
        self.read_record().status
    }

    pub(crate) fn seq(&self) -> u64 {
        self.read_record().seq
    }

    /// Replace the published record. Callers must hold the mutation lock.
    pub(crate) fn publish(&self, record: JobRecord) {
        match self.record.write() {
            Ok(mut guard) => *guard = record,
            Err(e) => {
                tracing::error!(job_id = %self.id, "RwLock poisoned writing job record: {e}");
                *e.into_inner() = record;
            }
        }
    }

    pub(crate) async fn lock_mutations(&self) -> MutexGuard<'_, ()> {
        self.write_lock.lock().await
    }

    pub(crate) fn log_len(&self) -> usize {
        self.read_log().len()
    }

    pub(crate) fn last_log_line(&self) -> Option<String> {
        self.read_log().last().cloned()
    }

    /// The last `tail` lines, or every line when `tail` is `None` or zero.
    pub(crate) fn log_tail(&self, tail: Option<usize>) -> (Vec<String>, usize) {
        let log = self.read_log();
        let total = log.len();
        let start = match tail {
            Some(n) if n > 0 => total.saturating_sub(n),
            _ => 0,
        };
        (log[start..].to_vec(), total)
    }

    pub(crate) fn next_line_no(&self) -> usize {
        self.next_line_no.load(Ordering::SeqCst)
    }

    /// Publish a log line and consume its store position. Callers must hold
    /// the mutation lock.
    pub(crate) fn push_log_line(&self, line: String) {
        self.write_log().push(line);
        self.next_line_no.fetch_add(1, Ordering::SeqCst);
    }

    pub(crate) fn cancel_token(&self) -> &CancellationToken {
        &self.cancel
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn state_with_log(lines: &[&str]) -> JobState {
        let record = JobRecord::new(
            JobId::new(),
            1,
            "echo",
            None,
            serde_json::json!({}),
            Utc::now(),
        );
        JobState::new(record, lines.iter().map(|l| l.to_string()).collect())
    }

    #[test]
    fn test_log_tail() {
        let state = state_with_log(&["a", "b", "c", "d"]);
        assert_eq!(state.log_tail(Some(2)), (vec!["c".into(), "d".into()], 4));
        assert_eq!(state.log_tail(Some(10)).0.len(), 4);
        assert_eq!(state.log_tail(Some(0)).0.len(), 4);
        assert_eq!(state.log_tail(None).0.len(), 4);
        assert_eq!(state.last_log_line().as_deref(), Some("d"));
    }

    #[test]
    fn test_empty_log() {
        let state = state_with_log(&[]);
        assert_eq!(state.log_tail(Some(5)), (Vec::new(), 0));
        assert!(state.last_log_line().is_none());
    }

    #[test]
    fn test_restored_cancel_request_trips_token() {
        let mut record = JobRecord::new(
            JobId::new(),
            1,
            "echo",
            None,
            serde_json::json!({}),
            Utc::now(),
        );
        record.request_cancel().unwrap();
        let state = JobState::new(record, Vec::new());
        assert!(state.cancel_token().is_cancelled());
    }

    #[test]
    fn test_line_numbers_continue_after_gap() {
        let state = state_with_log(&["a", "c"]).resume_log_at(3);
        assert_eq!(state.next_line_no(), 3);
        state.push_log_line("d".into());
        assert_eq!(state.next_line_no(), 4);
        assert_eq!(state.log_len(), 3);

        // A stale position never moves the counter backwards.
        let state = state_with_log(&["a", "b"]).resume_log_at(1);
        assert_eq!(state.next_line_no(), 2);
    }

    #[test]
    fn test_publish_replaces_snapshot() {
        let state = state_with_log(&[]);
        let mut next = state.snapshot();
        next.mark_running(Utc::now()).unwrap();
        state.publish(next);
        assert_eq!(state.status(), JobStatus::Running);
    }
}
