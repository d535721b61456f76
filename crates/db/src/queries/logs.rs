//! Append-only job log queries.

use std::collections::HashMap;

use alphagenome_mcp_types::JobId;

use crate::{Database, DbResult};

impl Database {
    /// Append one line at position `line_no` (0-based) of a job's log.
    ///
    /// The primary key on `(job_id, line_no)` rejects a second write to the
    /// same position, so lines can never be overwritten or reordered.
    pub async fn append_job_log(&self, id: &JobId, line_no: usize, line: &str) -> DbResult<()> {
        sqlx::query("INSERT INTO job_logs (job_id, line_no, line) VALUES (?, ?, ?)")
            .bind(id.to_string())
            .bind(line_no as i64)
            .bind(line)
            .execute(self.pool())
            .await?;
        Ok(())
    }

    /// Full log of one job in emission order.
    pub async fn get_job_log(&self, id: &JobId) -> DbResult<Vec<String>> {
        let rows: Vec<(String,)> =
            sqlx::query_as("SELECT line FROM job_logs WHERE job_id = ? ORDER BY line_no")
                .bind(id.to_string())
                .fetch_all(self.pool())
                .await?;
        Ok(rows.into_iter().map(|(line,)| line).collect())
    }

    /// Every job's log, keyed by job id. Used to rebuild the registry at startup.
    ///
    /// Rows whose `job_id` does not parse are skipped with a warning.
    pub async fn load_all_job_logs(&self) -> DbResult<HashMap<JobId, Vec<String>>> {
        let rows: Vec<(String, String)> =
            sqlx::query_as("SELECT job_id, line FROM job_logs ORDER BY job_id, line_no")
                .fetch_all(self.pool())
                .await?;

        let mut logs: HashMap<JobId, Vec<String>> = HashMap::new();
        for (job_id, line) in rows {
            match job_id.parse::<JobId>() {
                Ok(id) => logs.entry(id).or_default().push(line),
                Err(e) => tracing::warn!(job_id = %job_id, error = %e, "Skipping log row"),
            }
        }
        Ok(logs)
    }

    /// Next free `line_no` for every job that has log rows: `MAX(line_no) + 1`.
    ///
    /// Differs from the row count when an earlier append never reached the
    /// store, leaving a gap.
    pub async fn next_log_line_nos(&self) -> DbResult<HashMap<JobId, usize>> {
        let rows: Vec<(String, i64)> =
            sqlx::query_as("SELECT job_id, MAX(line_no) + 1 FROM job_logs GROUP BY job_id")
                .fetch_all(self.pool())
                .await?;

        let mut next = HashMap::with_capacity(rows.len());
        for (job_id, line_no) in rows {
            match job_id.parse::<JobId>() {
                Ok(id) => {
                    next.insert(id, usize::try_from(line_no).unwrap_or(0));
                }
                Err(e) => tracing::warn!(job_id = %job_id, error = %e, "Skipping log row"),
            }
        }
        Ok(next)
    }
}

#[cfg(test)]
mod tests {
    use crate::Database;
    use alphagenome_mcp_types::JobId;

    #[tokio::test]
    async fn test_log_preserves_emission_order() {
        let db = Database::new_in_memory().await.unwrap();
        let id = JobId::new();
        for (i, line) in ["starting", "item 1", "item 2", "done"].iter().enumerate() {
            db.append_job_log(&id, i, line).await.unwrap();
        }
        let log = db.get_job_log(&id).await.unwrap();
        assert_eq!(log, vec!["starting", "item 1", "item 2", "done"]);
    }

    #[tokio::test]
    async fn test_log_position_cannot_be_overwritten() {
        let db = Database::new_in_memory().await.unwrap();
        let id = JobId::new();
        db.append_job_log(&id, 0, "first").await.unwrap();
        assert!(db.append_job_log(&id, 0, "impostor").await.is_err());
        assert_eq!(db.get_job_log(&id).await.unwrap(), vec!["first"]);
    }

    #[tokio::test]
    async fn test_load_all_job_logs_groups_by_job() {
        let db = Database::new_in_memory().await.unwrap();
        let a = JobId::new();
        let b = JobId::new();
        db.append_job_log(&a, 0, "a0").await.unwrap();
        db.append_job_log(&b, 0, "b0").await.unwrap();
        db.append_job_log(&a, 1, "a1").await.unwrap();

        let logs = db.load_all_job_logs().await.unwrap();
        assert_eq!(logs.len(), 2);
        assert_eq!(logs[&a], vec!["a0", "a1"]);
        assert_eq!(logs[&b], vec!["b0"]);
    }

    #[tokio::test]
    async fn test_next_line_no_skips_gaps() {
        let db = Database::new_in_memory().await.unwrap();
        let id = JobId::new();
        db.append_job_log(&id, 0, "a").await.unwrap();
        db.append_job_log(&id, 2, "c").await.unwrap();

        let next = db.next_log_line_nos().await.unwrap();
        assert_eq!(next.get(&id), Some(&3));
        assert_eq!(db.get_job_log(&id).await.unwrap().len(), 2);
    }
}
