//! API request and response types, plus the error-to-HTTP mapping.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::engine::EngineError;
use crate::model::TaskStatus;
use crate::store::StoreError;

/// Stable JSON error body. `error` is a machine-checkable code;
/// `detail` is the human-readable specifics.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

/// Engine/store failure on its way out as an HTTP response.
#[derive(Debug)]
pub struct ApiError(pub EngineError);

impl From<EngineError> for ApiError {
    fn from(e: EngineError) -> Self {
        ApiError(e)
    }
}

impl From<StoreError> for ApiError {
    fn from(e: StoreError) -> Self {
        ApiError(EngineError::Storage(e))
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code) = match &self.0 {
            EngineError::NotFound { .. } => (StatusCode::NOT_FOUND, "not_found"),
            EngineError::InvalidRequest(_) => (StatusCode::BAD_REQUEST, "invalid_request"),
            EngineError::AlreadyResolved(_) => (StatusCode::CONFLICT, "already_resolved"),
            EngineError::Storage(e) => {
                tracing::error!("storage failure: {}", e);
                (StatusCode::INTERNAL_SERVER_ERROR, "storage_failure")
            }
        };
        let body = ErrorResponse {
            error: code,
            detail: Some(self.0.to_string()),
        };
        (status, Json(body)).into_response()
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateProjectRequest {
    pub name: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RenameProjectRequest {
    pub name: String,
}

/// Request to create a task on a project.
#[derive(Debug, Clone, Deserialize)]
pub struct CreateTaskRequest {
    /// Free-form tag; defaults to "general"
    #[serde(default = "default_category")]
    pub category: String,
    pub description: String,
    #[serde(default)]
    pub steps: Vec<String>,
    /// Initial column; defaults to todo
    pub status: Option<TaskStatus>,
    /// Position within the column; defaults to the end
    pub position: Option<i64>,
}

fn default_category() -> String {
    "general".to_string()
}

/// Partial task update; omitted fields are left untouched.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateTaskRequest {
    pub category: Option<String>,
    pub description: Option<String>,
    pub steps: Option<Vec<String>>,
    pub status: Option<TaskStatus>,
    pub position: Option<i64>,
    pub agent_notes: Option<String>,
}

/// Request to start an execution.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct StartExecutionRequest {
    pub task_id: Option<Uuid>,
    #[serde(default)]
    pub auto_approve: bool,
    pub config: Option<Value>,
}

/// Human response to a pending decision/approval/error.
#[derive(Debug, Clone, Deserialize)]
pub struct SubmitResponseRequest {
    pub response_type: String,
    pub response_id: String,
    pub value: Value,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SubmitResponseResponse {
    /// Id of the event the response was matched to
    pub event_id: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ActivityQuery {
    pub limit: Option<usize>,
}

#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub persistent: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_kinds_map_to_distinct_statuses() {
        let cases = [
            (
                ApiError(EngineError::not_found("project", "p1")),
                StatusCode::NOT_FOUND,
            ),
            (
                ApiError(EngineError::InvalidRequest("bad type".into())),
                StatusCode::BAD_REQUEST,
            ),
            (
                ApiError(EngineError::AlreadyResolved("d1".into())),
                StatusCode::CONFLICT,
            ),
            (
                ApiError(EngineError::Storage(StoreError::Database("disk full".into()))),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];
        for (err, expected) in cases {
            assert_eq!(err.into_response().status(), expected);
        }
    }
}
