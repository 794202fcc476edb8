//! Project CRUD and the activity feed.

use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::Json,
};
use uuid::Uuid;

use super::routes::AppState;
use super::types::*;
use crate::engine::EngineError;
use crate::model::{ActivityEvent, Project};

/// Default number of events in the activity feed.
const DEFAULT_ACTIVITY_LIMIT: usize = 50;

pub async fn list_projects(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<Project>>, ApiError> {
    Ok(Json(state.store.list_projects().await?))
}

pub async fn create_project(
    State(state): State<Arc<AppState>>,
    Json(req): Json<CreateProjectRequest>,
) -> Result<(StatusCode, Json<Project>), ApiError> {
    let name = req.name.trim();
    if name.is_empty() {
        return Err(EngineError::InvalidRequest("name is required".into()).into());
    }
    let project = state.store.create_project(name).await?;
    tracing::info!(project_id = %project.id, name, "project created");
    Ok((StatusCode::CREATED, Json(project)))
}

pub async fn get_project(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<Project>, ApiError> {
    state
        .store
        .get_project(id)
        .await?
        .map(Json)
        .ok_or_else(|| EngineError::not_found("project", id).into())
}

pub async fn rename_project(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(req): Json<RenameProjectRequest>,
) -> Result<Json<Project>, ApiError> {
    let name = req.name.trim();
    if name.is_empty() {
        return Err(EngineError::InvalidRequest("name is required".into()).into());
    }
    if !state.store.rename_project(id, name).await? {
        return Err(EngineError::not_found("project", id).into());
    }
    get_project(State(state), Path(id)).await
}

pub async fn delete_project(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    if state.store.delete_project(id).await? {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(EngineError::not_found("project", id).into())
    }
}

/// Recent activity events, newest first.
pub async fn activity_feed(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Query(query): Query<ActivityQuery>,
) -> Result<Json<Vec<ActivityEvent>>, ApiError> {
    state
        .store
        .get_project(id)
        .await?
        .ok_or_else(|| ApiError::from(EngineError::not_found("project", id)))?;
    let limit = query.limit.unwrap_or(DEFAULT_ACTIVITY_LIMIT);
    Ok(Json(state.store.recent_events(id, limit).await?))
}
