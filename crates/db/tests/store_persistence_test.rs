//! Integration tests: job records and logs survive closing and reopening the store.

use alphagenome_mcp_db::Database;
use alphagenome_mcp_types::{JobId, JobRecord, JobStatus};
use chrono::Utc;
use pretty_assertions::assert_eq;
use tokio_test::{assert_err, assert_ok};

#[tokio::test]
async fn test_job_and_log_survive_reopen() {
    let tmp = tempfile::tempdir().unwrap();
    let path = tmp.path().join("jobs.db");

    let id = JobId::new();
    {
        let db = Database::new(&path).await.unwrap();
        let mut record = JobRecord::new(
            id,
            1,
            "echo",
            Some("greeting".into()),
            serde_json::json!({"value": "hello"}),
            Utc::now(),
        );
        db.insert_job(&record).await.unwrap();
        db.append_job_log(&id, 0, "starting").await.unwrap();
        db.append_job_log(&id, 1, "echoing hello").await.unwrap();

        record.mark_running(Utc::now()).unwrap();
        record.mark_failed("bad input", Utc::now()).unwrap();
        db.update_job(&record).await.unwrap();
        db.pool().close().await;
    }

    let db = Database::new(&path).await.unwrap();
    let loaded = db.get_job(&id).await.unwrap().expect("job persisted");
    assert_eq!(loaded.status, JobStatus::Failed);
    assert_eq!(loaded.error.as_deref(), Some("bad input"));
    assert_eq!(loaded.name.as_deref(), Some("greeting"));
    assert!(loaded.result.is_none());
    assert_eq!(
        db.get_job_log(&id).await.unwrap(),
        vec!["starting", "echoing hello"]
    );
    assert_eq!(db.max_job_seq().await.unwrap(), 1);
}

#[tokio::test]
async fn test_concurrent_writers_on_file_store() {
    let tmp = tempfile::tempdir().unwrap();
    let db = Database::new(&tmp.path().join("jobs.db")).await.unwrap();

    let mut handles = Vec::new();
    for seq in 1..=16u64 {
        let db = db.clone();
        handles.push(tokio::spawn(async move {
            let record = JobRecord::new(
                JobId::new(),
                seq,
                "echo",
                None,
                serde_json::json!({}),
                Utc::now(),
            );
            db.insert_job(&record).await.unwrap();
            for i in 0..5 {
                db.append_job_log(&record.id, i, &format!("line {i}"))
                    .await
                    .unwrap();
            }
            record.id
        }));
    }

    for handle in handles {
        let id = handle.await.unwrap();
        assert_eq!(db.get_job_log(&id).await.unwrap().len(), 5);
    }
    assert_eq!(db.list_jobs(None).await.unwrap().len(), 16);
}

#[tokio::test]
async fn test_log_positions_and_ids_are_write_once() {
    let tmp = tempfile::tempdir().unwrap();
    let db = Database::new(&tmp.path().join("jobs.db")).await.unwrap();

    let record = JobRecord::new(JobId::new(), 1, "echo", None, serde_json::json!({}), Utc::now());
    assert_ok!(db.insert_job(&record).await);
    assert_err!(db.insert_job(&record).await);

    assert_ok!(db.append_job_log(&record.id, 0, "first").await);
    assert_err!(db.append_job_log(&record.id, 0, "overwrite").await);
    assert_eq!(db.get_job_log(&record.id).await.unwrap(), vec!["first"]);
}
