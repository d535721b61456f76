// crates/server/src/config.rs
//! Command-line and environment configuration for the server binary.

use std::net::IpAddr;
use std::path::PathBuf;
use std::time::Duration;

use alphagenome_mcp_observability::{LogConfig, DEFAULT_FILTER};
use alphagenome_mcp_server_jobs::{JobManagerConfig, RetentionPolicy, ShutdownMode};
use clap::{Parser, ValueEnum};

/// Default port for the server.
pub const DEFAULT_PORT: u16 = 47920;

#[derive(Parser, Debug, Clone)]
#[command(
    name = "alphagenome-mcp",
    version,
    about = "Job server for long-running genomic analysis calls"
)]
pub struct Args {
    /// Address to bind.
    #[arg(long, default_value = "127.0.0.1", env = "ALPHAGENOME_MCP_HOST")]
    pub host: IpAddr,

    /// Port to listen on.
    #[arg(long, default_value_t = DEFAULT_PORT, env = "ALPHAGENOME_MCP_PORT")]
    pub port: u16,

    /// Job store location. Defaults to `<cache dir>/alphagenome-mcp/jobs.db`.
    #[arg(long, env = "ALPHAGENOME_MCP_DB_PATH")]
    pub db_path: Option<PathBuf>,

    /// Maximum number of jobs running at once.
    #[arg(long, default_value_t = 4, env = "ALPHAGENOME_MCP_WORKERS")]
    pub workers: usize,

    /// Seconds a running job gets to honor cancellation before it is stopped.
    #[arg(long, default_value_t = 5, env = "ALPHAGENOME_MCP_CANCEL_GRACE_SECS")]
    pub cancel_grace_secs: u64,

    /// Purge finished jobs older than this many seconds. Unset keeps them forever.
    #[arg(long, env = "ALPHAGENOME_MCP_RETENTION_SECS")]
    pub retention_secs: Option<u64>,

    /// Seconds between retention sweeps.
    #[arg(long, default_value_t = 300, env = "ALPHAGENOME_MCP_SWEEP_INTERVAL_SECS")]
    pub sweep_interval_secs: u64,

    /// Cancel jobs left Pending by a previous run instead of resuming them.
    #[arg(long, env = "ALPHAGENOME_MCP_NO_RESUME_PENDING")]
    pub no_resume_pending: bool,

    /// What to do with unfinished jobs on shutdown.
    #[arg(long, value_enum, default_value_t = ShutdownArg::Cancel, env = "ALPHAGENOME_MCP_SHUTDOWN")]
    pub shutdown: ShutdownArg,

    /// Log JSON lines instead of the compact console format.
    #[arg(long, env = "ALPHAGENOME_MCP_LOG_JSON")]
    pub log_json: bool,

    /// Also write daily-rolling JSON logs to this directory.
    #[arg(long, env = "ALPHAGENOME_MCP_LOG_DIR")]
    pub log_dir: Option<PathBuf>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ShutdownArg {
    /// Finish queued and running jobs before exiting.
    Drain,
    /// Cancel unfinished jobs before exiting.
    Cancel,
}

impl Args {
    pub fn job_config(&self) -> JobManagerConfig {
        JobManagerConfig {
            max_concurrency: self.workers,
            cancel_grace: Duration::from_secs(self.cancel_grace_secs),
            retention: match self.retention_secs {
                Some(secs) => RetentionPolicy::MaxAge(Duration::from_secs(secs)),
                None => RetentionPolicy::KeepForever,
            },
            sweep_interval: Duration::from_secs(self.sweep_interval_secs),
            resume_pending: !self.no_resume_pending,
        }
    }

    pub fn log_config(&self) -> LogConfig {
        LogConfig {
            default_filter: DEFAULT_FILTER.to_string(),
            json: self.log_json,
            log_dir: self.log_dir.clone(),
            ..Default::default()
        }
    }

    pub fn shutdown_mode(&self) -> ShutdownMode {
        match self.shutdown {
            ShutdownArg::Drain => ShutdownMode::Drain,
            ShutdownArg::Cancel => ShutdownMode::CancelAll,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio_test::{assert_err, assert_ok};

    #[test]
    fn test_defaults_map_to_job_config() {
        let args = assert_ok!(Args::try_parse_from(["alphagenome-mcp"]));
        let config = args.job_config();
        assert_eq!(config.max_concurrency, 4);
        assert_eq!(config.cancel_grace, Duration::from_secs(5));
        assert_eq!(config.retention, RetentionPolicy::KeepForever);
        assert!(config.resume_pending);
        assert_eq!(args.shutdown_mode(), ShutdownMode::CancelAll);
    }

    #[test]
    fn test_flags_override_defaults() {
        let args = assert_ok!(Args::try_parse_from([
            "alphagenome-mcp",
            "--workers",
            "8",
            "--retention-secs",
            "3600",
            "--no-resume-pending",
            "--shutdown",
            "drain",
            "--db-path",
            "/tmp/jobs.db",
        ]));
        let config = args.job_config();
        assert_eq!(config.max_concurrency, 8);
        assert_eq!(
            config.retention,
            RetentionPolicy::MaxAge(Duration::from_secs(3600))
        );
        assert!(!config.resume_pending);
        assert_eq!(args.shutdown_mode(), ShutdownMode::Drain);
        assert_eq!(args.db_path, Some(PathBuf::from("/tmp/jobs.db")));
    }

    #[test]
    fn test_rejects_unknown_shutdown_mode() {
        assert_err!(Args::try_parse_from(["alphagenome-mcp", "--shutdown", "abandon"]));
    }
}
