/// Inline SQL migrations for the job store schema.
///
/// We use simple inline migrations rather than sqlx migration files
/// because the schema is small and self-contained.

pub const MIGRATIONS: &[&str] = &[
    // Migration 1: job metadata
    r#"
CREATE TABLE IF NOT EXISTS jobs (
    seq              INTEGER PRIMARY KEY,
    id               TEXT NOT NULL UNIQUE,
    kind             TEXT NOT NULL,
    name             TEXT,
    status           TEXT NOT NULL,
    params           TEXT NOT NULL DEFAULT 'null',
    result           TEXT,
    error            TEXT,
    cancel_requested BOOLEAN NOT NULL DEFAULT 0,
    submitted_at     INTEGER NOT NULL,
    started_at       INTEGER,
    completed_at     INTEGER
);
"#,
    r#"CREATE INDEX IF NOT EXISTS idx_jobs_status ON jobs(status, seq);"#,
    // Migration 2: append-only per-job log
    r#"
CREATE TABLE IF NOT EXISTS job_logs (
    job_id  TEXT NOT NULL,
    line_no INTEGER NOT NULL,
    line    TEXT NOT NULL,
    PRIMARY KEY (job_id, line_no)
);
"#,
];
