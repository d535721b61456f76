// crates/server/src/lib.rs
//! AlphaGenome MCP job server library.
//!
//! This crate provides the Axum-based HTTP surface over the job manager:
//! submit long-running analysis calls, poll their status, read their logs,
//! fetch their results and cancel them.

pub mod config;
pub mod error;
pub mod kinds;
pub mod metrics;
pub mod routes;
pub mod state;

pub use config::Args;
pub use error::*;
pub use kinds::builtin_handlers;
pub use metrics::{init_metrics, render_metrics};
pub use routes::api_routes;
pub use state::AppState;

use std::sync::Arc;

use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

/// Create the Axum application with all routes and middleware.
///
/// This sets up:
/// - API routes (health, jobs) and `/metrics`
/// - CORS (allows any origin)
/// - Request tracing
pub fn create_app(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .merge(api_routes(state))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
}

/// App state over a fresh in-memory store with the built-in kinds.
#[cfg(test)]
pub(crate) async fn test_state() -> Arc<AppState> {
    use alphagenome_mcp_db::Database;
    use alphagenome_mcp_server_jobs::{JobManager, JobManagerConfig};

    let db = Database::new_in_memory().await.unwrap();
    let handlers = builtin_handlers().unwrap();
    let jobs = JobManager::start(db, handlers, JobManagerConfig::default())
        .await
        .unwrap();
    AppState::new(jobs)
}

// ============================================================================
// Integration Tests
// ============================================================================
