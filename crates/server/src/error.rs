// crates/server/src/error.rs
use alphagenome_mcp_server_jobs::JobError;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

/// Structured JSON error response for API errors
#[derive(Debug, Serialize)]
#[cfg_attr(test, derive(serde::Deserialize))]
pub struct ErrorResponse {
    pub error: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl ErrorResponse {
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            details: None,
        }
    }

    pub fn with_details(error: impl Into<String>, details: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            details: Some(details.into()),
        }
    }
}

/// API error types that map to HTTP status codes
#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    Job(#[from] JobError),

    #[error("Bad request: {0}")]
    BadRequest(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_response) = match &self {
            ApiError::Job(JobError::NotFound(id)) => {
                tracing::warn!(job_id = %id, "Job not found");
                (
                    StatusCode::NOT_FOUND,
                    ErrorResponse::with_details("Job not found", format!("Job ID: {id}")),
                )
            }
            ApiError::Job(JobError::InvalidKind(kind)) => {
                tracing::warn!(kind = %kind, "Unknown job kind");
                (
                    StatusCode::BAD_REQUEST,
                    ErrorResponse::with_details("Unknown job kind", kind.clone()),
                )
            }
            ApiError::Job(JobError::ShuttingDown) => {
                tracing::warn!("Submission rejected during shutdown");
                (
                    StatusCode::SERVICE_UNAVAILABLE,
                    ErrorResponse::new("Job manager is shutting down"),
                )
            }
            ApiError::Job(JobError::Storage(db_err)) => {
                tracing::error!(error = %db_err, "Job store error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    ErrorResponse::with_details("Job store error", db_err.to_string()),
                )
            }
            ApiError::Job(JobError::Transition(e)) => {
                tracing::error!(error = %e, "Illegal job transition");
                (
                    StatusCode::CONFLICT,
                    ErrorResponse::with_details("Illegal job transition", e.to_string()),
                )
            }
            ApiError::BadRequest(msg) => {
                tracing::warn!(message = %msg, "Bad request");
                (
                    StatusCode::BAD_REQUEST,
                    ErrorResponse::with_details("Bad request", msg.clone()),
                )
            }
        };

        (status, Json(error_response)).into_response()
    }
}

/// Result type alias for API handlers
pub type ApiResult<T> = Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;
    use alphagenome_mcp_db::DbError;
    use alphagenome_mcp_types::JobId;
    use axum::body::to_bytes;

    /// Helper to extract status code and body from a response
    async fn extract_response(response: Response) -> (StatusCode, ErrorResponse) {
        let status = response.status();
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let error_response: ErrorResponse = serde_json::from_slice(&body).unwrap();
        (status, error_response)
    }

    #[tokio::test]
    async fn test_not_found_returns_404() {
        let id = JobId::new();
        let response = ApiError::from(JobError::NotFound(id)).into_response();
        let (status, body) = extract_response(response).await;

        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body.error, "Job not found");
        assert!(body.details.unwrap().contains(&id.to_string()));
    }

    #[tokio::test]
    async fn test_invalid_kind_returns_400() {
        let response = ApiError::from(JobError::InvalidKind("score_variant".into())).into_response();
        let (status, body) = extract_response(response).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body.error, "Unknown job kind");
        assert_eq!(body.details.as_deref(), Some("score_variant"));
    }

    #[tokio::test]
    async fn test_shutting_down_returns_503() {
        let response = ApiError::from(JobError::ShuttingDown).into_response();
        let (status, body) = extract_response(response).await;

        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert!(body.details.is_none());
    }

    #[tokio::test]
    async fn test_storage_returns_500() {
        let response = ApiError::from(JobError::Storage(DbError::NoCacheDir)).into_response();
        let (status, body) = extract_response(response).await;

        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body.error, "Job store error");
    }

    #[tokio::test]
    async fn test_bad_request_returns_400() {
        let response = ApiError::BadRequest("invalid job id".into()).into_response();
        let (status, body) = extract_response(response).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body.details.as_deref(), Some("invalid job id"));
    }

    #[test]
    fn test_error_response_skips_empty_details() {
        let json = serde_json::to_string(&ErrorResponse::new("Job manager is shutting down")).unwrap();
        assert_eq!(json, r#"{"error":"Job manager is shutting down"}"#);
    }
}
