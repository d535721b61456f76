// crates/types/src/view.rs
//! Snapshots returned by the job manager's public API.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::job::{JobId, JobRecord, JobStatus};

/// Immediate status snapshot for `status(job_id)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobStatusView {
    pub job_id: JobId,
    pub kind: String,
    pub name: Option<String>,
    pub status: JobStatus,
    pub submitted_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
    pub cancel_requested: bool,
    /// Number of log lines emitted so far.
    pub log_lines: usize,
    /// Most recent log line, as a best-effort progress indicator.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub progress: Option<String>,
}

impl JobStatusView {
    pub fn new(record: &JobRecord, log_lines: usize, progress: Option<String>) -> Self {
        Self {
            job_id: record.id,
            kind: record.kind.clone(),
            name: record.name.clone(),
            status: record.status,
            submitted_at: record.submitted_at,
            started_at: record.started_at,
            completed_at: record.completed_at,
            cancel_requested: record.cancel_requested,
            log_lines,
            progress,
        }
    }
}

/// Answer to `result(job_id)`.
///
/// `NotReady` means the job has not reached a terminal state yet; it is not a
/// failure and not an empty result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum JobOutcome {
    Completed {
        job_id: JobId,
        result: serde_json::Value,
    },
    Failed {
        job_id: JobId,
        error: String,
    },
    Cancelled {
        job_id: JobId,
    },
    NotReady {
        job_id: JobId,
        status: JobStatus,
    },
}

impl JobOutcome {
    pub fn from_record(record: &JobRecord) -> Self {
        let job_id = record.id;
        match record.status {
            JobStatus::Completed => JobOutcome::Completed {
                job_id,
                result: record.result.clone().unwrap_or(serde_json::Value::Null),
            },
            JobStatus::Failed => JobOutcome::Failed {
                job_id,
                error: record.error.clone().unwrap_or_default(),
            },
            JobStatus::Cancelled => JobOutcome::Cancelled { job_id },
            status @ (JobStatus::Pending | JobStatus::Running) => {
                JobOutcome::NotReady { job_id, status }
            }
        }
    }

    pub fn is_ready(&self) -> bool {
        !matches!(self, JobOutcome::NotReady { .. })
    }
}

/// Answer to `log(job_id, tail)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobLog {
    pub job_id: JobId,
    pub status: JobStatus,
    pub lines: Vec<String>,
    /// Length of the full log, regardless of `tail`.
    pub total_lines: usize,
}

/// One row of `list(status_filter)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobSummary {
    pub job_id: JobId,
    pub kind: String,
    pub name: Option<String>,
    pub status: JobStatus,
    pub submitted_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
}

impl From<&JobRecord> for JobSummary {
    fn from(record: &JobRecord) -> Self {
        Self {
            job_id: record.id,
            kind: record.kind.clone(),
            name: record.name.clone(),
            status: record.status,
            submitted_at: record.submitted_at,
            completed_at: record.completed_at,
        }
    }
}

/// What a `cancel(job_id)` call did.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CancelOutcome {
    /// The job was Pending and went straight to Cancelled.
    CancelledBeforeStart,
    /// The job is Running; the work function has been asked to stop.
    CancellationRequested,
    /// The job was already terminal; nothing changed.
    AlreadyTerminal,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CancelAck {
    pub job_id: JobId,
    pub status: JobStatus,
    pub outcome: CancelOutcome,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(status: JobStatus) -> JobRecord {
        let mut r = JobRecord::new(
            JobId::new(),
            7,
            "echo",
            Some("greeting".into()),
            serde_json::json!({}),
            Utc::now(),
        );
        r.status = status;
        r
    }

    #[test]
    fn test_outcome_not_ready_for_live_jobs() {
        for status in [JobStatus::Pending, JobStatus::Running] {
            let outcome = JobOutcome::from_record(&record(status));
            assert!(!outcome.is_ready());
            assert!(matches!(outcome, JobOutcome::NotReady { status: s, .. } if s == status));
        }
    }

    #[test]
    fn test_outcome_serializes_with_state_tag() {
        let mut r = record(JobStatus::Completed);
        r.result = Some(serde_json::json!({"echoed": "hello"}));
        let json = serde_json::to_value(JobOutcome::from_record(&r)).unwrap();
        assert_eq!(json["state"], "completed");
        assert_eq!(json["result"]["echoed"], "hello");

        let mut r = record(JobStatus::Failed);
        r.error = Some("bad input".into());
        let json = serde_json::to_value(JobOutcome::from_record(&r)).unwrap();
        assert_eq!(json["state"], "failed");
        assert_eq!(json["error"], "bad input");

        let json = serde_json::to_value(JobOutcome::from_record(&record(JobStatus::Running)))
            .unwrap();
        assert_eq!(json["state"], "not_ready");
        assert_eq!(json["status"], "running");
    }

    #[test]
    fn test_status_view_omits_unset_timestamps() {
        let view = JobStatusView::new(&record(JobStatus::Pending), 0, None);
        let json = serde_json::to_string(&view).unwrap();
        assert!(json.contains("\"status\":\"pending\""));
        assert!(!json.contains("started_at"));
        assert!(!json.contains("progress"));
    }

    #[test]
    fn test_cancel_outcome_serialize() {
        let json = serde_json::to_string(&CancelOutcome::AlreadyTerminal).unwrap();
        assert_eq!(json, "\"already_terminal\"");
    }
}
