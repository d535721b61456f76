// crates/observability/src/lib.rs
//! Tracing setup shared by the server binary and tools.
//!
//! One call to [`init_tracing`] installs a global subscriber: an `EnvFilter`
//! (from `RUST_LOG`, falling back to the configured default), a console layer
//! on stderr in compact or JSON form, and optionally a JSON file layer that
//! rolls daily.

use std::path::PathBuf;

use anyhow::Context;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter, Layer, Registry};

/// Default directives when `RUST_LOG` is unset.
pub const DEFAULT_FILTER: &str = "info,sqlx=warn,tower_http=info";

#[derive(Debug, Clone)]
pub struct LogConfig {
    /// Directives used when `RUST_LOG` is unset or invalid.
    pub default_filter: String,
    /// Emit console logs as JSON lines instead of the compact format.
    pub json: bool,
    /// Also write JSON logs to a daily-rolling file in this directory.
    pub log_dir: Option<PathBuf>,
    /// File name prefix for rolled log files.
    pub file_prefix: String,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            default_filter: DEFAULT_FILTER.to_string(),
            json: false,
            log_dir: None,
            file_prefix: "alphagenome-mcp.log".to_string(),
        }
    }
}

/// Keeps the background file writer alive. Dropping it flushes buffered
/// lines, so hold it until the process exits.
#[must_use = "dropping the guard stops file logging"]
pub struct LogGuard {
    _file: Option<WorkerGuard>,
}

/// `RUST_LOG` if it parses, otherwise `default`.
pub fn env_filter(default: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default))
}

/// Install the global tracing subscriber. Fails if one is already set.
pub fn init_tracing(config: &LogConfig) -> anyhow::Result<LogGuard> {
    let mut layers: Vec<Box<dyn Layer<Registry> + Send + Sync>> = Vec::new();

    let console = fmt::layer().with_writer(std::io::stderr).with_target(true);
    layers.push(if config.json {
        console.json().boxed()
    } else {
        console.compact().boxed()
    });

    let mut file_guard = None;
    if let Some(dir) = &config.log_dir {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("creating log directory {}", dir.display()))?;
        let appender = tracing_appender::rolling::daily(dir, &config.file_prefix);
        let (writer, guard) = tracing_appender::non_blocking(appender);
        layers.push(
            fmt::layer()
                .json()
                .with_ansi(false)
                .with_writer(writer)
                .boxed(),
        );
        file_guard = Some(guard);
    }

    tracing_subscriber::registry()
        .with(layers)
        .with(env_filter(&config.default_filter))
        .try_init()
        .context("installing global tracing subscriber")?;

    Ok(LogGuard { _file: file_guard })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = LogConfig::default();
        assert!(!config.json);
        assert!(config.log_dir.is_none());
        assert_eq!(config.default_filter, DEFAULT_FILTER);
    }

    #[test]
    fn test_env_filter_falls_back_to_default() {
        let filter = env_filter("warn");
        // Either RUST_LOG or the fallback; both must render as directives.
        assert!(!filter.to_string().is_empty());
    }

    #[test]
    fn test_file_layer_writes_rolled_log() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = tmp.path().join("logs");
        let guard = init_tracing(&LogConfig {
            default_filter: "info".into(),
            log_dir: Some(dir.clone()),
            file_prefix: "test.log".into(),
            ..Default::default()
        })
        .unwrap();

        tracing::info!(job_id = "abc", "Job submitted");
        drop(guard);

        let files: Vec<_> = std::fs::read_dir(&dir).unwrap().collect();
        assert_eq!(files.len(), 1);
        let path = files[0].as_ref().unwrap().path();
        let contents = std::fs::read_to_string(path).unwrap();
        assert!(contents.contains("Job submitted"), "{contents}");

        // A second global subscriber is refused.
        assert!(init_tracing(&LogConfig::default()).is_err());
    }
}
