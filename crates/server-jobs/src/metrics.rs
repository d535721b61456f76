// crates/server-jobs/src/metrics.rs
//! Job lifecycle metrics, emitted through the `metrics` facade.
//!
//! Nothing is recorded unless the host installs a recorder.

use std::time::Duration;

use alphagenome_mcp_types::JobStatus;
use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram};

/// Describe every job metric. Call once after installing a recorder.
pub fn describe_metrics() {
    describe_counter!("jobs_submitted_total", "Jobs accepted by submit, by kind");
    describe_counter!(
        "jobs_finished_total",
        "Jobs that reached a terminal state, by kind and status"
    );
    describe_histogram!(
        "job_duration_seconds",
        "Wall-clock time from start to terminal state, by kind"
    );
    describe_gauge!("jobs_running", "Jobs currently executing");
    describe_counter!(
        "job_store_failures_total",
        "Job store writes that failed, by operation"
    );
}

pub(crate) fn record_submitted(kind: &str) {
    counter!("jobs_submitted_total", "kind" => kind.to_string()).increment(1);
}

pub(crate) fn record_finished(kind: &str, status: JobStatus, elapsed: Option<Duration>) {
    counter!(
        "jobs_finished_total",
        "kind" => kind.to_string(),
        "status" => status.as_str()
    )
    .increment(1);
    if let Some(elapsed) = elapsed {
        histogram!("job_duration_seconds", "kind" => kind.to_string())
            .record(elapsed.as_secs_f64());
    }
}

pub(crate) fn job_started() {
    gauge!("jobs_running").increment(1.0);
}

pub(crate) fn job_stopped() {
    gauge!("jobs_running").decrement(1.0);
}

pub(crate) fn record_storage_failure(operation: &'static str) {
    counter!("job_store_failures_total", "operation" => operation).increment(1);
}
