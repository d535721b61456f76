// crates/server/src/main.rs
//! AlphaGenome MCP job server binary.
//!
//! Opens the job store, restores persisted jobs, starts the worker pool and
//! serves the HTTP API until SIGINT/SIGTERM. The job manager is shut down
//! after the listener stops accepting requests.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use alphagenome_mcp_db::Database;
use alphagenome_mcp_observability::init_tracing;
use alphagenome_mcp_server::{builtin_handlers, create_app, init_metrics, AppState, Args};
use alphagenome_mcp_server_jobs::JobManager;
use anyhow::{Context, Result};
use clap::Parser;

#[tokio::main]
async fn main() -> Result<()> {
    let startup_start = Instant::now();
    let args = Args::parse();

    // Keep the guard alive so the file writer flushes on exit.
    let _log_guard = init_tracing(&args.log_config())?;
    init_metrics();

    let db = match &args.db_path {
        Some(path) => Database::new(path).await,
        None => Database::open_default().await,
    }
    .context("failed to open job store")?;
    tracing::info!(path = %db.db_path().display(), "Job store opened");

    let handlers = builtin_handlers()?;
    let jobs = JobManager::start(db, handlers, args.job_config()).await?;

    let state = AppState::new(Arc::clone(&jobs));
    let app = create_app(state);

    let addr = SocketAddr::new(args.host, args.port);
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    tracing::info!(
        %addr,
        startup_ms = startup_start.elapsed().as_millis() as u64,
        "Server listening"
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    let mode = args.shutdown_mode();
    tracing::info!(?mode, "HTTP server stopped; shutting down job manager");
    jobs.shutdown(mode).await;
    tracing::info!("Shutdown complete");
    Ok(())
}

/// Resolve on SIGINT, or SIGTERM on Unix.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl-C: {e}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => tracing::info!("Received SIGINT, starting graceful shutdown"),
        () = terminate => tracing::info!("Received SIGTERM, starting graceful shutdown"),
    }
}
