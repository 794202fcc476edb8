//! Task CRUD (the Task Aggregate's external face).
//!
//! Task mutations also leave a trace in the activity log:
//! `task_created` on creation, `task_updated` on edits, and
//! `task_completed` when a status move lands a task in done. The
//! status engine only ever reads tasks; these handlers are the
//! writers.

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::Json,
};
use serde_json::json;
use uuid::Uuid;

use super::routes::AppState;
use super::types::*;
use crate::engine::EngineError;
use crate::model::{EventType, Task, TaskStatus};
use crate::store::{NewTask, TaskPatch};

pub async fn list_tasks(
    State(state): State<Arc<AppState>>,
    Path(project_id): Path<Uuid>,
) -> Result<Json<Vec<Task>>, ApiError> {
    require_project(&state, project_id).await?;
    Ok(Json(state.store.list_tasks(project_id).await?))
}

pub async fn create_task(
    State(state): State<Arc<AppState>>,
    Path(project_id): Path<Uuid>,
    Json(req): Json<CreateTaskRequest>,
) -> Result<(StatusCode, Json<Task>), ApiError> {
    require_project(&state, project_id).await?;
    if req.description.trim().is_empty() {
        return Err(EngineError::InvalidRequest("description is required".into()).into());
    }

    let position = match req.position {
        Some(position) => position,
        // Default to the end of the column.
        None => state
            .store
            .list_tasks(project_id)
            .await?
            .iter()
            .map(|t| t.position + 1)
            .max()
            .unwrap_or(0),
    };

    let task = state
        .store
        .create_task(
            project_id,
            NewTask {
                category: req.category,
                description: req.description,
                steps: req.steps,
                status: req.status.unwrap_or(TaskStatus::Todo),
                position,
            },
        )
        .await?;

    state
        .store
        .append_event(
            project_id,
            EventType::TaskCreated,
            json!({"task_id": task.id.to_string(), "category": task.category}),
            Some(format!("Task created: {}", task.description)),
        )
        .await?;

    Ok((StatusCode::CREATED, Json(task)))
}

pub async fn get_task(
    State(state): State<Arc<AppState>>,
    Path((project_id, task_id)): Path<(Uuid, Uuid)>,
) -> Result<Json<Task>, ApiError> {
    state
        .store
        .get_task(project_id, task_id)
        .await?
        .map(Json)
        .ok_or_else(|| EngineError::not_found("task", task_id).into())
}

pub async fn update_task(
    State(state): State<Arc<AppState>>,
    Path((project_id, task_id)): Path<(Uuid, Uuid)>,
    Json(req): Json<UpdateTaskRequest>,
) -> Result<Json<Task>, ApiError> {
    let before = state
        .store
        .get_task(project_id, task_id)
        .await?
        .ok_or_else(|| ApiError::from(EngineError::not_found("task", task_id)))?;

    let task = state
        .store
        .update_task(
            project_id,
            task_id,
            TaskPatch {
                category: req.category,
                description: req.description,
                steps: req.steps,
                status: req.status,
                position: req.position,
                agent_notes: req.agent_notes,
            },
        )
        .await?
        .ok_or_else(|| ApiError::from(EngineError::not_found("task", task_id)))?;

    let completed = task.status == TaskStatus::Done && before.status != TaskStatus::Done;
    let (event_type, rationale) = if completed {
        (
            EventType::TaskCompleted,
            format!("Task completed: {}", task.description),
        )
    } else {
        (
            EventType::TaskUpdated,
            format!("Task updated: {}", task.description),
        )
    };
    state
        .store
        .append_event(
            project_id,
            event_type,
            json!({
                "task_id": task.id.to_string(),
                "status": task.status.as_str(),
            }),
            Some(rationale),
        )
        .await?;

    Ok(Json(task))
}

pub async fn delete_task(
    State(state): State<Arc<AppState>>,
    Path((project_id, task_id)): Path<(Uuid, Uuid)>,
) -> Result<StatusCode, ApiError> {
    if state.store.delete_task(project_id, task_id).await? {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(EngineError::not_found("task", task_id).into())
    }
}

async fn require_project(state: &AppState, project_id: Uuid) -> Result<(), ApiError> {
    state
        .store
        .get_project(project_id)
        .await?
        .map(|_| ())
        .ok_or_else(|| EngineError::not_found("project", project_id).into())
}
