//! Row tuples and conversions between SQLite columns and `JobRecord`.

use alphagenome_mcp_types::{JobId, JobRecord, JobStatus};
use chrono::{DateTime, Utc};

use crate::{DbError, DbResult};

/// Column order shared by every `SELECT` that produces a `JobRow`.
pub(crate) const JOB_COLUMNS: &str = "seq, id, kind, name, status, params, result, error, \
     cancel_requested, submitted_at, started_at, completed_at";

pub(crate) type JobRow = (
    i64,            // seq
    String,         // id
    String,         // kind
    Option<String>, // name
    String,         // status
    String,         // params
    Option<String>, // result
    Option<String>, // error
    bool,           // cancel_requested
    i64,            // submitted_at
    Option<i64>,    // started_at
    Option<i64>,    // completed_at
);

pub(crate) fn to_millis(ts: DateTime<Utc>) -> i64 {
    ts.timestamp_millis()
}

fn from_millis(id: &str, column: &str, ms: i64) -> DbResult<DateTime<Utc>> {
    DateTime::<Utc>::from_timestamp_millis(ms).ok_or_else(|| DbError::Corrupt {
        id: id.to_string(),
        reason: format!("{column} out of range: {ms}"),
    })
}

pub(crate) fn row_to_record(row: JobRow) -> DbResult<JobRecord> {
    let (
        seq,
        id,
        kind,
        name,
        status,
        params,
        result,
        error,
        cancel_requested,
        submitted_at,
        started_at,
        completed_at,
    ) = row;

    let job_id: JobId = id.parse().map_err(|e| DbError::Corrupt {
        id: id.clone(),
        reason: format!("{e}"),
    })?;
    let status: JobStatus = status.parse().map_err(|e| DbError::Corrupt {
        id: id.clone(),
        reason: format!("{e}"),
    })?;
    let seq = u64::try_from(seq).map_err(|_| DbError::Corrupt {
        id: id.clone(),
        reason: format!("negative seq {seq}"),
    })?;

    Ok(JobRecord {
        id: job_id,
        seq,
        kind,
        name,
        status,
        params: serde_json::from_str(&params)?,
        result: result.as_deref().map(serde_json::from_str).transpose()?,
        error,
        cancel_requested,
        submitted_at: from_millis(&id, "submitted_at", submitted_at)?,
        started_at: started_at
            .map(|ms| from_millis(&id, "started_at", ms))
            .transpose()?,
        completed_at: completed_at
            .map(|ms| from_millis(&id, "completed_at", ms))
            .transpose()?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(status: &str, submitted_at: i64) -> JobRow {
        (
            3,
            JobId::new().to_string(),
            "echo".into(),
            None,
            status.into(),
            r#"{"value":"hello"}"#.into(),
            None,
            None,
            false,
            submitted_at,
            None,
            None,
        )
    }

    #[test]
    fn test_row_to_record() {
        let record = row_to_record(row("pending", 1_700_000_000_000)).unwrap();
        assert_eq!(record.seq, 3);
        assert_eq!(record.status, JobStatus::Pending);
        assert_eq!(record.params["value"], "hello");
        assert_eq!(to_millis(record.submitted_at), 1_700_000_000_000);
    }

    #[test]
    fn test_unknown_status_is_corrupt() {
        let err = row_to_record(row("exploded", 0)).unwrap_err();
        assert!(matches!(err, DbError::Corrupt { .. }), "got {err:?}");
    }

    #[test]
    fn test_bad_params_json_is_error() {
        let mut r = row("pending", 0);
        r.5 = "{not json".into();
        assert!(matches!(row_to_record(r), Err(DbError::Json(_))));
    }
}
