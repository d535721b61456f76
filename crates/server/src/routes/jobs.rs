// crates/server/src/routes/jobs.rs
//! API routes for the job manager.
//!
//! Every handler reads or mutates job metadata only; none waits for a job to
//! finish.

use std::sync::Arc;

use alphagenome_mcp_types::{
    CancelAck, JobId, JobLog, JobOutcome, JobStatus, JobStatusView, JobSummary,
};
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

/// Log lines returned when `tail` is not given.
pub const DEFAULT_LOG_TAIL: usize = 50;

#[derive(Debug, Deserialize)]
pub struct SubmitRequest {
    pub kind: String,
    #[serde(default)]
    pub params: Value,
    #[serde(default)]
    pub name: Option<String>,
}

#[derive(Debug, Serialize)]
#[cfg_attr(test, derive(Deserialize))]
pub struct SubmitResponse {
    pub job_id: JobId,
    pub status: JobStatus,
}

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    pub status: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct LogQuery {
    pub tail: Option<usize>,
}

fn parse_job_id(raw: &str) -> ApiResult<JobId> {
    raw.parse()
        .map_err(|e| ApiError::BadRequest(format!("{e}")))
}

/// POST /api/jobs - Submit a job; responds once it is recorded.
async fn submit_job(
    State(state): State<Arc<AppState>>,
    Json(req): Json<SubmitRequest>,
) -> ApiResult<(StatusCode, Json<SubmitResponse>)> {
    let job_id = state.jobs.submit(&req.kind, req.params, req.name).await?;
    Ok((
        StatusCode::ACCEPTED,
        Json(SubmitResponse {
            job_id,
            status: JobStatus::Pending,
        }),
    ))
}

/// GET /api/jobs?status= - Jobs in submission order.
async fn list_jobs(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ListQuery>,
) -> ApiResult<Json<Vec<JobSummary>>> {
    let status = match query.status.as_deref() {
        Some(raw) if !raw.is_empty() => Some(
            raw.parse::<JobStatus>()
                .map_err(|e| ApiError::BadRequest(e.to_string()))?,
        ),
        _ => None,
    };
    Ok(Json(state.jobs.list(status)))
}

/// GET /api/jobs/{id}
async fn job_status(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> ApiResult<Json<JobStatusView>> {
    let id = parse_job_id(&id)?;
    Ok(Json(state.jobs.status(&id)?))
}

/// GET /api/jobs/{id}/result
async fn job_result(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> ApiResult<Json<JobOutcome>> {
    let id = parse_job_id(&id)?;
    Ok(Json(state.jobs.result(&id)?))
}

/// GET /api/jobs/{id}/log?tail=
async fn job_log(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Query(query): Query<LogQuery>,
) -> ApiResult<Json<JobLog>> {
    let id = parse_job_id(&id)?;
    let tail = query.tail.unwrap_or(DEFAULT_LOG_TAIL);
    Ok(Json(state.jobs.log(&id, Some(tail))?))
}

/// POST /api/jobs/{id}/cancel
async fn cancel_job(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> ApiResult<Json<CancelAck>> {
    let id = parse_job_id(&id)?;
    Ok(Json(state.jobs.cancel(&id).await?))
}

/// Build the jobs router.
pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/jobs", post(submit_job).get(list_jobs))
        .route("/jobs/{id}", get(job_status))
        .route("/jobs/{id}/result", get(job_result))
        .route("/jobs/{id}/log", get(job_log))
        .route("/jobs/{id}/cancel", post(cancel_job))
}
