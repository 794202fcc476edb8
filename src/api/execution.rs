//! Execution status engine endpoints.

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    response::Json,
};
use uuid::Uuid;

use super::routes::AppState;
use super::types::*;
use crate::engine::StartOptions;
use crate::model::ExecutionStatus;

pub async fn get_status(
    State(state): State<Arc<AppState>>,
    Path(project_id): Path<Uuid>,
) -> Result<Json<ExecutionStatus>, ApiError> {
    Ok(Json(state.engine.status(project_id).await?))
}

pub async fn start(
    State(state): State<Arc<AppState>>,
    Path(project_id): Path<Uuid>,
    Json(req): Json<StartExecutionRequest>,
) -> Result<Json<ExecutionStatus>, ApiError> {
    let opts = StartOptions {
        task_id: req.task_id,
        auto_approve: req.auto_approve,
        config: req.config,
    };
    Ok(Json(state.engine.start(project_id, opts).await?))
}

pub async fn pause(
    State(state): State<Arc<AppState>>,
    Path(project_id): Path<Uuid>,
) -> Result<Json<ExecutionStatus>, ApiError> {
    Ok(Json(state.engine.pause(project_id).await?))
}

pub async fn stop(
    State(state): State<Arc<AppState>>,
    Path(project_id): Path<Uuid>,
) -> Result<Json<ExecutionStatus>, ApiError> {
    Ok(Json(state.engine.stop(project_id).await?))
}

pub async fn respond(
    State(state): State<Arc<AppState>>,
    Path(project_id): Path<Uuid>,
    Json(req): Json<SubmitResponseRequest>,
) -> Result<Json<SubmitResponseResponse>, ApiError> {
    let event_id = state
        .engine
        .submit_response(
            project_id,
            &req.response_type,
            &req.response_id,
            req.value,
            req.notes,
        )
        .await?;
    Ok(Json(SubmitResponseResponse { event_id }))
}
