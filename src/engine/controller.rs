//! Start/pause/stop surface for externally driven executions.
//!
//! Every call appends a phase-transition event and returns the
//! reconstructed status. The controller deliberately enforces no
//! transition table: pausing a stopped execution is accepted, because
//! the log is a record of requests, not a validated state machine.

use std::sync::Arc;

use serde_json::{json, Value};
use tracing::info;
use uuid::Uuid;

use super::{EngineError, StatusReconstructor};
use crate::model::{EventType, ExecutionStatus, TaskStatus};
use crate::store::DashboardStore;

/// Options for starting an execution.
#[derive(Debug, Clone, Default)]
pub struct StartOptions {
    /// Task to focus on first, if any. Must belong to the project.
    pub task_id: Option<Uuid>,
    /// Skip approval_needed round-trips on the agent side.
    pub auto_approve: bool,
    /// Opaque execution configuration, recorded in the event payload.
    pub config: Option<Value>,
}

#[derive(Clone)]
pub struct ExecutionController {
    store: Arc<dyn DashboardStore>,
    reconstructor: StatusReconstructor,
}

impl ExecutionController {
    pub fn new(store: Arc<dyn DashboardStore>, reconstructor: StatusReconstructor) -> Self {
        Self {
            store,
            reconstructor,
        }
    }

    /// Record an execution start and return the resulting status.
    pub async fn start(
        &self,
        project_id: Uuid,
        opts: StartOptions,
    ) -> Result<ExecutionStatus, EngineError> {
        self.store
            .get_project(project_id)
            .await?
            .ok_or_else(|| EngineError::not_found("project", project_id))?;

        if let Some(task_id) = opts.task_id {
            self.store
                .get_task(project_id, task_id)
                .await?
                .ok_or_else(|| EngineError::not_found("task", task_id))?;
        }

        let tasks = self.store.list_tasks(project_id).await?;
        let completed = tasks
            .iter()
            .filter(|t| t.status == TaskStatus::Done)
            .count();

        let mut payload = json!({
            "total_tasks": tasks.len(),
            "completed_tasks": completed,
            "auto_approve": opts.auto_approve,
        });
        if let Some(task_id) = opts.task_id {
            payload["task_id"] = json!(task_id.to_string());
        }
        if let Some(config) = opts.config {
            payload["config"] = config;
        }

        self.store
            .append_event(
                project_id,
                EventType::ExecutionStarted,
                payload,
                Some("Execution started".into()),
            )
            .await?;
        info!(project_id = %project_id, "execution start recorded");

        self.reconstructor.status(project_id).await
    }

    /// Record an execution pause and return the resulting status.
    pub async fn pause(&self, project_id: Uuid) -> Result<ExecutionStatus, EngineError> {
        self.transition(project_id, EventType::ExecutionPaused, "Execution paused")
            .await
    }

    /// Record an execution stop and return the resulting status.
    pub async fn stop(&self, project_id: Uuid) -> Result<ExecutionStatus, EngineError> {
        self.transition(project_id, EventType::ExecutionStopped, "Execution stopped")
            .await
    }

    async fn transition(
        &self,
        project_id: Uuid,
        event_type: EventType,
        rationale: &str,
    ) -> Result<ExecutionStatus, EngineError> {
        self.store
            .get_project(project_id)
            .await?
            .ok_or_else(|| EngineError::not_found("project", project_id))?;

        self.store
            .append_event(project_id, event_type, json!({}), Some(rationale.into()))
            .await?;
        info!(project_id = %project_id, event = event_type.as_str(), "transition recorded");

        self.reconstructor.status(project_id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::status::DEFAULT_LOOKBACK;
    use crate::model::ExecutionPhase;
    use crate::store::{MemoryStore, NewTask, TaskPatch};

    fn controller(store: &MemoryStore) -> ExecutionController {
        let store: Arc<dyn DashboardStore> = Arc::new(store.clone());
        let reconstructor = StatusReconstructor::new(store.clone(), DEFAULT_LOOKBACK);
        ExecutionController::new(store, reconstructor)
    }

    async fn seed_tasks(store: &MemoryStore, project_id: Uuid, total: usize) -> Vec<Uuid> {
        let mut ids = Vec::new();
        for i in 0..total {
            let task = store
                .create_task(
                    project_id,
                    NewTask {
                        category: "general".into(),
                        description: format!("task {}", i),
                        steps: vec![],
                        status: TaskStatus::Todo,
                        position: i as i64,
                    },
                )
                .await
                .unwrap();
            ids.push(task.id);
        }
        ids
    }

    #[tokio::test]
    async fn start_on_missing_project_is_not_found() {
        let store = MemoryStore::new();
        let err = controller(&store)
            .start(Uuid::new_v4(), StartOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::NotFound { what: "project", .. }));
    }

    #[tokio::test]
    async fn start_with_foreign_task_is_not_found() {
        let store = MemoryStore::new();
        let project = store.create_project("p").await.unwrap();
        let other = store.create_project("other").await.unwrap();
        let foreign = seed_tasks(&store, other.id, 1).await[0];
        let err = controller(&store)
            .start(
                project.id,
                StartOptions {
                    task_id: Some(foreign),
                    ..Default::default()
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::NotFound { what: "task", .. }));
    }

    #[tokio::test]
    async fn start_returns_running_with_zero_progress() {
        let store = MemoryStore::new();
        let project = store.create_project("p").await.unwrap();
        seed_tasks(&store, project.id, 4).await;

        let status = controller(&store)
            .start(project.id, StartOptions::default())
            .await
            .unwrap();
        assert_eq!(status.phase, ExecutionPhase::Running);
        assert_eq!(status.progress, 0);
        assert_eq!(status.total_tasks, 4);

        // The appended event carries the counters.
        let events = store
            .events_of_type(project.id, EventType::ExecutionStarted)
            .await
            .unwrap();
        assert_eq!(events[0].payload["total_tasks"], json!(4));
        assert_eq!(events[0].payload["completed_tasks"], json!(0));
    }

    #[tokio::test]
    async fn marking_all_tasks_done_completes_without_event() {
        let store = MemoryStore::new();
        let project = store.create_project("p").await.unwrap();
        let task_ids = seed_tasks(&store, project.id, 4).await;

        for task_id in task_ids {
            store
                .update_task(
                    project.id,
                    task_id,
                    TaskPatch {
                        status: Some(TaskStatus::Done),
                        ..Default::default()
                    },
                )
                .await
                .unwrap();
        }

        let reconstructor =
            StatusReconstructor::new(Arc::new(store.clone()), DEFAULT_LOOKBACK);
        let status = reconstructor.status(project.id).await.unwrap();
        assert_eq!(status.phase, ExecutionPhase::Completed);
        assert_eq!(status.progress, 100);
    }

    #[tokio::test]
    async fn pause_then_stop_track_the_latest_request() {
        let store = MemoryStore::new();
        let project = store.create_project("p").await.unwrap();
        let controller = controller(&store);

        let status = controller
            .start(project.id, StartOptions::default())
            .await
            .unwrap();
        assert_eq!(status.phase, ExecutionPhase::Running);

        let status = controller.pause(project.id).await.unwrap();
        assert_eq!(status.phase, ExecutionPhase::Paused);

        let status = controller.stop(project.id).await.unwrap();
        assert_eq!(status.phase, ExecutionPhase::Stopped);
    }

    #[tokio::test]
    async fn pause_after_stop_is_accepted() {
        let store = MemoryStore::new();
        let project = store.create_project("p").await.unwrap();
        let controller = controller(&store);

        controller.stop(project.id).await.unwrap();
        // No transition table: a pause on a stopped execution is still
        // recorded and reported.
        let status = controller.pause(project.id).await.unwrap();
        assert_eq!(status.phase, ExecutionPhase::Paused);
    }

    #[tokio::test]
    async fn start_with_task_records_current_task() {
        let store = MemoryStore::new();
        let project = store.create_project("p").await.unwrap();
        let task_id = seed_tasks(&store, project.id, 2).await[0];

        let status = controller(&store)
            .start(
                project.id,
                StartOptions {
                    task_id: Some(task_id),
                    auto_approve: true,
                    config: Some(json!({"model": "sonnet"})),
                },
            )
            .await
            .unwrap();
        assert_eq!(status.current_task_id, Some(task_id));
    }
}
