//! API route handlers for the job server.

pub mod health;
pub mod jobs;
pub mod metrics;

use std::sync::Arc;

use axum::Router;

use crate::state::AppState;

/// Create the combined API router with all routes under /api prefix.
///
/// Routes:
/// - GET  /api/health - Health check
/// - POST /api/jobs - Submit a job
/// - GET  /api/jobs?status= - List jobs in submission order
/// - GET  /api/jobs/{id} - Job status
/// - GET  /api/jobs/{id}/result - Job result, failure, or not-ready
/// - GET  /api/jobs/{id}/log?tail= - Job log (last 50 lines by default, 0 = all)
/// - POST /api/jobs/{id}/cancel - Cancel a job
/// - GET  /metrics - Prometheus metrics
pub fn api_routes(state: Arc<AppState>) -> Router {
    Router::new()
        .nest("/api", health::router())
        .nest("/api", jobs::router())
        .merge(metrics::router())
        .with_state(state)
}
