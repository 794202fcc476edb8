//! Status reconstruction from the activity log.
//!
//! There is no persisted phase field: the current phase is derived on
//! every read by scanning the most recent events, newest first, until
//! a phase-defining event is found. The scan is bounded by a lookback
//! window; a phase-defining event older than `window` more-recent
//! events is never observed. The window must therefore be sized
//! generously relative to how chatty the log is between phase
//! changes.

use std::sync::Arc;
use uuid::Uuid;

use super::EngineError;
use crate::model::{
    progress_percent, ActivityEvent, EventType, ExecutionPhase, ExecutionStatus, Project,
    TaskStatus,
};
use crate::store::DashboardStore;

/// Default lookback window, overridable via config.
pub const DEFAULT_LOOKBACK: usize = 10;

#[derive(Clone)]
pub struct StatusReconstructor {
    store: Arc<dyn DashboardStore>,
    window: usize,
}

impl StatusReconstructor {
    pub fn new(store: Arc<dyn DashboardStore>, window: usize) -> Self {
        Self { store, window }
    }

    /// Reconstruct the execution status of a project.
    ///
    /// Fails with `NotFound` before touching the task aggregate or
    /// the event log when the project does not exist.
    pub async fn status(&self, project_id: Uuid) -> Result<ExecutionStatus, EngineError> {
        let project = self
            .store
            .get_project(project_id)
            .await?
            .ok_or_else(|| EngineError::not_found("project", project_id))?;

        let tasks = self.store.list_tasks(project_id).await?;
        let total_tasks = tasks.len();
        let completed_tasks = tasks
            .iter()
            .filter(|t| t.status == TaskStatus::Done)
            .count();
        let progress = progress_percent(completed_tasks, total_tasks);

        let events = self.store.recent_events(project_id, self.window).await?;

        let mut status = ExecutionStatus {
            phase: ExecutionPhase::Idle,
            current_task_id: None,
            started_at: None,
            paused_at: None,
            stopped_at: None,
            completed_at: None,
            total_tasks,
            completed_tasks,
            progress,
            message: String::new(),
        };

        // First phase-defining event (newest first) wins; older ones
        // never override it.
        if let Some(event) = events.iter().find(|e| e.event_type.is_phase_defining()) {
            apply_phase_event(&mut status, event);
        }

        // All tasks done but the log never said so: promote idle to
        // completed. Any explicitly logged phase, error included,
        // stands as-is.
        if status.phase == ExecutionPhase::Idle && total_tasks > 0 && completed_tasks == total_tasks
        {
            status.phase = ExecutionPhase::Completed;
        }

        status.message = summary(&project, &status);
        Ok(status)
    }
}

fn apply_phase_event(status: &mut ExecutionStatus, event: &ActivityEvent) {
    status.current_task_id = event
        .payload_str("task_id")
        .and_then(|s| Uuid::parse_str(s).ok());
    match event.event_type {
        EventType::ExecutionStarted => {
            status.phase = ExecutionPhase::Running;
            status.started_at = Some(event.timestamp);
        }
        EventType::ExecutionPaused => {
            status.phase = ExecutionPhase::Paused;
            status.paused_at = Some(event.timestamp);
        }
        EventType::ExecutionStopped => {
            status.phase = ExecutionPhase::Stopped;
            status.stopped_at = Some(event.timestamp);
        }
        EventType::ExecutionCompleted => {
            status.phase = ExecutionPhase::Completed;
            status.completed_at = Some(event.timestamp);
        }
        EventType::Error => {
            status.phase = ExecutionPhase::Error;
        }
        _ => unreachable!("not a phase-defining event"),
    }
}

/// Display sentence for the dashboard header.
fn summary(project: &Project, status: &ExecutionStatus) -> String {
    let verb = match status.phase {
        ExecutionPhase::Idle => "is idle",
        ExecutionPhase::Running => "is running",
        ExecutionPhase::Paused => "is paused",
        ExecutionPhase::Stopped => "is stopped",
        ExecutionPhase::Completed => "is complete",
        ExecutionPhase::Error => "hit an error",
    };
    format!(
        "Project '{}' {}: {} of {} tasks complete ({}%)",
        project.name, verb, status.completed_tasks, status.total_tasks, status.progress
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{MemoryStore, NewTask};
    use serde_json::json;

    async fn project_with_tasks(store: &MemoryStore, done: usize, total: usize) -> Uuid {
        let project = store.create_project("demo").await.unwrap();
        for i in 0..total {
            store
                .create_task(
                    project.id,
                    NewTask {
                        category: "general".into(),
                        description: format!("task {}", i),
                        steps: vec![],
                        status: if i < done {
                            TaskStatus::Done
                        } else {
                            TaskStatus::Todo
                        },
                        position: i as i64,
                    },
                )
                .await
                .unwrap();
        }
        project.id
    }

    fn reconstructor(store: &MemoryStore) -> StatusReconstructor {
        StatusReconstructor::new(Arc::new(store.clone()), DEFAULT_LOOKBACK)
    }

    #[tokio::test]
    async fn missing_project_is_not_found() {
        let store = MemoryStore::new();
        let err = reconstructor(&store).status(Uuid::new_v4()).await.unwrap_err();
        assert!(matches!(err, EngineError::NotFound { what: "project", .. }));
    }

    #[tokio::test]
    async fn empty_log_zero_tasks_is_idle_zero_progress() {
        let store = MemoryStore::new();
        let project_id = project_with_tasks(&store, 0, 0).await;
        let status = reconstructor(&store).status(project_id).await.unwrap();
        assert_eq!(status.phase, ExecutionPhase::Idle);
        assert_eq!(status.progress, 0);
        assert!(status.message.contains("demo"));
    }

    #[tokio::test]
    async fn newest_phase_event_wins() {
        let store = MemoryStore::new();
        let project_id = project_with_tasks(&store, 0, 4).await;
        store
            .append_event(project_id, EventType::ExecutionStarted, json!({}), None)
            .await
            .unwrap();

        let status = reconstructor(&store).status(project_id).await.unwrap();
        assert_eq!(status.phase, ExecutionPhase::Running);
        assert_eq!(status.progress, 0);
        assert!(status.started_at.is_some());

        // A pause appended strictly after the start flips the phase on
        // the next read.
        store
            .append_event(project_id, EventType::ExecutionPaused, json!({}), None)
            .await
            .unwrap();
        let status = reconstructor(&store).status(project_id).await.unwrap();
        assert_eq!(status.phase, ExecutionPhase::Paused);
        assert!(status.paused_at.is_some());
        assert!(status.started_at.is_none());
    }

    #[tokio::test]
    async fn non_phase_events_do_not_change_phase() {
        let store = MemoryStore::new();
        let project_id = project_with_tasks(&store, 0, 2).await;
        store
            .append_event(project_id, EventType::ExecutionStarted, json!({}), None)
            .await
            .unwrap();
        for _ in 0..3 {
            store
                .append_event(project_id, EventType::Activity, json!({}), None)
                .await
                .unwrap();
        }
        let status = reconstructor(&store).status(project_id).await.unwrap();
        assert_eq!(status.phase, ExecutionPhase::Running);
    }

    #[tokio::test]
    async fn all_tasks_done_promotes_idle_to_completed() {
        let store = MemoryStore::new();
        let project_id = project_with_tasks(&store, 4, 4).await;
        // No execution_completed event has ever been appended.
        let status = reconstructor(&store).status(project_id).await.unwrap();
        assert_eq!(status.phase, ExecutionPhase::Completed);
        assert_eq!(status.progress, 100);
    }

    #[tokio::test]
    async fn error_event_freezes_phase_despite_completion() {
        let store = MemoryStore::new();
        let project_id = project_with_tasks(&store, 4, 4).await;
        store
            .append_event(
                project_id,
                EventType::Error,
                json!({"error_id": "e1"}),
                Some("agent crashed".into()),
            )
            .await
            .unwrap();
        let status = reconstructor(&store).status(project_id).await.unwrap();
        assert_eq!(status.phase, ExecutionPhase::Error);
        assert_eq!(status.progress, 100);
    }

    #[tokio::test]
    async fn running_phase_not_promoted_by_completion() {
        let store = MemoryStore::new();
        let project_id = project_with_tasks(&store, 4, 4).await;
        store
            .append_event(project_id, EventType::ExecutionStarted, json!({}), None)
            .await
            .unwrap();
        let status = reconstructor(&store).status(project_id).await.unwrap();
        // Only idle is promoted; an explicit running phase stands.
        assert_eq!(status.phase, ExecutionPhase::Running);
    }

    #[tokio::test]
    async fn phase_event_evicted_from_window_is_not_observed() {
        let store = MemoryStore::new();
        let project_id = project_with_tasks(&store, 0, 2).await;
        store
            .append_event(project_id, EventType::ExecutionStarted, json!({}), None)
            .await
            .unwrap();
        // Push the start event out of a window of 3.
        for _ in 0..3 {
            store
                .append_event(project_id, EventType::Activity, json!({}), None)
                .await
                .unwrap();
        }
        let narrow = StatusReconstructor::new(Arc::new(store.clone()), 3);
        let status = narrow.status(project_id).await.unwrap();
        assert_eq!(status.phase, ExecutionPhase::Idle);
    }

    #[tokio::test]
    async fn current_task_comes_from_fixing_event() {
        let store = MemoryStore::new();
        let project_id = project_with_tasks(&store, 0, 1).await;
        let task = &store.list_tasks(project_id).await.unwrap()[0];
        store
            .append_event(
                project_id,
                EventType::ExecutionStarted,
                json!({"task_id": task.id.to_string()}),
                None,
            )
            .await
            .unwrap();
        let status = reconstructor(&store).status(project_id).await.unwrap();
        assert_eq!(status.current_task_id, Some(task.id));
    }
}
