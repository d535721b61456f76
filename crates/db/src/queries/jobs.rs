//! Job metadata CRUD queries.

use alphagenome_mcp_types::{JobId, JobRecord, JobStatus};

use super::row_types::{row_to_record, to_millis, JobRow, JOB_COLUMNS};
use crate::{Database, DbError, DbResult};

impl Database {
    /// Persist a newly submitted job.
    pub async fn insert_job(&self, job: &JobRecord) -> DbResult<()> {
        sqlx::query(
            r#"INSERT INTO jobs (
                seq, id, kind, name, status, params, result, error,
                cancel_requested, submitted_at, started_at, completed_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)"#,
        )
        .bind(job.seq as i64)
        .bind(job.id.to_string())
        .bind(&job.kind)
        .bind(job.name.as_deref())
        .bind(job.status.as_str())
        .bind(serde_json::to_string(&job.params)?)
        .bind(job.result.as_ref().map(serde_json::to_string).transpose()?)
        .bind(job.error.as_deref())
        .bind(job.cancel_requested)
        .bind(to_millis(job.submitted_at))
        .bind(job.started_at.map(to_millis))
        .bind(job.completed_at.map(to_millis))
        .execute(self.pool())
        .await?;
        Ok(())
    }

    /// Write every mutable column of an existing job.
    ///
    /// Writes the full mutable state rather than a diff, so a later successful
    /// write reconciles any earlier write that failed.
    pub async fn update_job(&self, job: &JobRecord) -> DbResult<()> {
        let result = sqlx::query(
            r#"UPDATE jobs SET
                status = ?, result = ?, error = ?, cancel_requested = ?,
                started_at = ?, completed_at = ?
            WHERE id = ?"#,
        )
        .bind(job.status.as_str())
        .bind(job.result.as_ref().map(serde_json::to_string).transpose()?)
        .bind(job.error.as_deref())
        .bind(job.cancel_requested)
        .bind(job.started_at.map(to_millis))
        .bind(job.completed_at.map(to_millis))
        .bind(job.id.to_string())
        .execute(self.pool())
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::JobNotFound(job.id.to_string()));
        }
        Ok(())
    }

    /// Fetch a single job by id.
    pub async fn get_job(&self, id: &JobId) -> DbResult<Option<JobRecord>> {
        let row: Option<JobRow> =
            sqlx::query_as(&format!("SELECT {JOB_COLUMNS} FROM jobs WHERE id = ?"))
                .bind(id.to_string())
                .fetch_optional(self.pool())
                .await?;
        row.map(row_to_record).transpose()
    }

    /// All jobs in submission order, optionally restricted to one status.
    pub async fn list_jobs(&self, status: Option<JobStatus>) -> DbResult<Vec<JobRecord>> {
        let rows: Vec<JobRow> = match status {
            Some(status) => {
                sqlx::query_as(&format!(
                    "SELECT {JOB_COLUMNS} FROM jobs WHERE status = ? ORDER BY seq"
                ))
                .bind(status.as_str())
                .fetch_all(self.pool())
                .await?
            }
            None => {
                sqlx::query_as(&format!("SELECT {JOB_COLUMNS} FROM jobs ORDER BY seq"))
                    .fetch_all(self.pool())
                    .await?
            }
        };
        rows.into_iter().map(row_to_record).collect()
    }

    /// Delete a job and its log. Returns whether a job row existed.
    pub async fn delete_job(&self, id: &JobId) -> DbResult<bool> {
        let id = id.to_string();
        let mut tx = self.pool().begin().await?;
        sqlx::query("DELETE FROM job_logs WHERE job_id = ?")
            .bind(&id)
            .execute(&mut *tx)
            .await?;
        let result = sqlx::query("DELETE FROM jobs WHERE id = ?")
            .bind(&id)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;
        Ok(result.rows_affected() > 0)
    }

    /// Highest submission sequence number in the store (0 when empty).
    pub async fn max_job_seq(&self) -> DbResult<u64> {
        let row: (i64,) = sqlx::query_as("SELECT COALESCE(MAX(seq), 0) FROM jobs")
            .fetch_one(self.pool())
            .await?;
        Ok(row.0.max(0) as u64)
    }
}

#[cfg(test)]
mod tests {
    use crate::Database;
    use alphagenome_mcp_types::{JobId, JobRecord, JobStatus};
    use chrono::{Duration, TimeZone, Utc};
    use pretty_assertions::assert_eq;

    fn job(seq: u64, kind: &str) -> JobRecord {
        JobRecord::new(
            JobId::new(),
            seq,
            kind,
            Some(format!("{kind}-{seq}")),
            serde_json::json!({"value": "hello", "n": seq}),
            Utc.timestamp_millis_opt(1_700_000_000_000 + seq as i64).unwrap(),
        )
    }

    #[tokio::test]
    async fn test_insert_and_get_roundtrip() {
        let db = Database::new_in_memory().await.unwrap();
        let record = job(1, "echo");
        db.insert_job(&record).await.unwrap();

        let loaded = db.get_job(&record.id).await.unwrap().expect("job exists");
        assert_eq!(loaded, record);
    }

    #[tokio::test]
    async fn test_get_unknown_job() {
        let db = Database::new_in_memory().await.unwrap();
        assert!(db.get_job(&JobId::new()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_update_persists_terminal_state() {
        let db = Database::new_in_memory().await.unwrap();
        let mut record = job(1, "echo");
        db.insert_job(&record).await.unwrap();

        let start = record.submitted_at + Duration::milliseconds(10);
        record.mark_running(start).unwrap();
        db.update_job(&record).await.unwrap();
        record
            .mark_completed(
                serde_json::json!({"echoed": "hello"}),
                start + Duration::milliseconds(100),
            )
            .unwrap();
        db.update_job(&record).await.unwrap();

        let loaded = db.get_job(&record.id).await.unwrap().unwrap();
        assert_eq!(loaded.status, JobStatus::Completed);
        assert_eq!(loaded.result, Some(serde_json::json!({"echoed": "hello"})));
        assert_eq!(loaded.started_at, Some(start));
        assert_eq!(loaded.completed_at, record.completed_at);
    }

    #[tokio::test]
    async fn test_update_missing_job_errors() {
        let db = Database::new_in_memory().await.unwrap();
        let err = db.update_job(&job(1, "echo")).await.unwrap_err();
        assert!(matches!(err, crate::DbError::JobNotFound(_)));
    }

    #[tokio::test]
    async fn test_duplicate_id_rejected() {
        let db = Database::new_in_memory().await.unwrap();
        let record = job(1, "echo");
        db.insert_job(&record).await.unwrap();

        let mut dup = job(2, "echo");
        dup.id = record.id;
        assert!(db.insert_job(&dup).await.is_err());
    }

    #[tokio::test]
    async fn test_list_jobs_in_submission_order_with_filter() {
        let db = Database::new_in_memory().await.unwrap();
        let mut jobs: Vec<JobRecord> = (1..=4).map(|seq| job(seq, "echo")).collect();
        // Insert out of order; listing must follow seq.
        for idx in [2, 0, 3, 1] {
            db.insert_job(&jobs[idx]).await.unwrap();
        }
        jobs[1].mark_running(Utc::now()).unwrap();
        db.update_job(&jobs[1]).await.unwrap();

        let all = db.list_jobs(None).await.unwrap();
        let seqs: Vec<u64> = all.iter().map(|j| j.seq).collect();
        assert_eq!(seqs, vec![1, 2, 3, 4]);

        let running = db.list_jobs(Some(JobStatus::Running)).await.unwrap();
        assert_eq!(running.len(), 1);
        assert_eq!(running[0].id, jobs[1].id);
    }

    #[tokio::test]
    async fn test_delete_job_removes_log() {
        let db = Database::new_in_memory().await.unwrap();
        let record = job(1, "echo");
        db.insert_job(&record).await.unwrap();
        db.append_job_log(&record.id, 0, "line").await.unwrap();

        assert!(db.delete_job(&record.id).await.unwrap());
        assert!(db.get_job(&record.id).await.unwrap().is_none());
        assert!(db.get_job_log(&record.id).await.unwrap().is_empty());
        assert!(!db.delete_job(&record.id).await.unwrap());
    }

    #[tokio::test]
    async fn test_max_job_seq() {
        let db = Database::new_in_memory().await.unwrap();
        assert_eq!(db.max_job_seq().await.unwrap(), 0);
        db.insert_job(&job(5, "echo")).await.unwrap();
        db.insert_job(&job(9, "echo")).await.unwrap();
        assert_eq!(db.max_job_seq().await.unwrap(), 9);
    }
}
