//! In-memory dashboard store (non-persistent).
//!
//! Backs `AGENTBOARD_STORE=memory` and the engine tests.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{DashboardStore, NewTask, ResolveOutcome, StoreError, TaskPatch};
use crate::model::{ActivityEvent, EventType, Project, Task};

#[derive(Default)]
struct Inner {
    projects: HashMap<Uuid, Project>,
    tasks: HashMap<Uuid, Task>,
    /// Append-only; index order is the log's total order.
    events: Vec<ActivityEvent>,
    next_event_id: i64,
}

#[derive(Clone, Default)]
pub struct MemoryStore {
    inner: Arc<RwLock<Inner>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl DashboardStore for MemoryStore {
    fn is_persistent(&self) -> bool {
        false
    }

    async fn list_projects(&self) -> Result<Vec<Project>, StoreError> {
        let inner = self.inner.read().await;
        let mut projects: Vec<Project> = inner.projects.values().cloned().collect();
        projects.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        Ok(projects)
    }

    async fn get_project(&self, id: Uuid) -> Result<Option<Project>, StoreError> {
        Ok(self.inner.read().await.projects.get(&id).cloned())
    }

    async fn create_project(&self, name: &str) -> Result<Project, StoreError> {
        let now = Utc::now();
        let project = Project {
            id: Uuid::new_v4(),
            name: name.to_string(),
            created_at: now,
            updated_at: now,
        };
        self.inner
            .write()
            .await
            .projects
            .insert(project.id, project.clone());
        Ok(project)
    }

    async fn rename_project(&self, id: Uuid, name: &str) -> Result<bool, StoreError> {
        let mut inner = self.inner.write().await;
        match inner.projects.get_mut(&id) {
            Some(project) => {
                project.name = name.to_string();
                project.updated_at = Utc::now();
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn delete_project(&self, id: Uuid) -> Result<bool, StoreError> {
        let mut inner = self.inner.write().await;
        if inner.projects.remove(&id).is_none() {
            return Ok(false);
        }
        inner.tasks.retain(|_, t| t.project_id != id);
        inner.events.retain(|e| e.project_id != id);
        Ok(true)
    }

    async fn list_tasks(&self, project_id: Uuid) -> Result<Vec<Task>, StoreError> {
        let inner = self.inner.read().await;
        let mut tasks: Vec<Task> = inner
            .tasks
            .values()
            .filter(|t| t.project_id == project_id)
            .cloned()
            .collect();
        tasks.sort_by_key(|t| (t.status.as_str(), t.position));
        Ok(tasks)
    }

    async fn get_task(
        &self,
        project_id: Uuid,
        task_id: Uuid,
    ) -> Result<Option<Task>, StoreError> {
        let inner = self.inner.read().await;
        Ok(inner
            .tasks
            .get(&task_id)
            .filter(|t| t.project_id == project_id)
            .cloned())
    }

    async fn create_task(&self, project_id: Uuid, new: NewTask) -> Result<Task, StoreError> {
        let now = Utc::now();
        let task = Task {
            id: Uuid::new_v4(),
            project_id,
            category: new.category,
            description: new.description,
            steps: new.steps,
            status: new.status,
            position: new.position,
            agent_notes: None,
            created_at: now,
            updated_at: now,
        };
        self.inner.write().await.tasks.insert(task.id, task.clone());
        Ok(task)
    }

    async fn update_task(
        &self,
        project_id: Uuid,
        task_id: Uuid,
        patch: TaskPatch,
    ) -> Result<Option<Task>, StoreError> {
        let mut inner = self.inner.write().await;
        let Some(task) = inner
            .tasks
            .get_mut(&task_id)
            .filter(|t| t.project_id == project_id)
        else {
            return Ok(None);
        };
        if let Some(category) = patch.category {
            task.category = category;
        }
        if let Some(description) = patch.description {
            task.description = description;
        }
        if let Some(steps) = patch.steps {
            task.steps = steps;
        }
        if let Some(status) = patch.status {
            task.status = status;
        }
        if let Some(position) = patch.position {
            task.position = position;
        }
        if let Some(notes) = patch.agent_notes {
            task.agent_notes = Some(notes);
        }
        task.updated_at = Utc::now();
        Ok(Some(task.clone()))
    }

    async fn delete_task(&self, project_id: Uuid, task_id: Uuid) -> Result<bool, StoreError> {
        let mut inner = self.inner.write().await;
        let matches = inner
            .tasks
            .get(&task_id)
            .map(|t| t.project_id == project_id)
            .unwrap_or(false);
        if matches {
            inner.tasks.remove(&task_id);
        }
        Ok(matches)
    }

    async fn append_event(
        &self,
        project_id: Uuid,
        event_type: EventType,
        payload: Value,
        rationale: Option<String>,
    ) -> Result<ActivityEvent, StoreError> {
        let mut inner = self.inner.write().await;
        inner.next_event_id += 1;
        let event = ActivityEvent {
            id: inner.next_event_id,
            project_id,
            event_type,
            timestamp: Utc::now(),
            payload,
            rationale,
        };
        inner.events.push(event.clone());
        Ok(event)
    }

    async fn recent_events(
        &self,
        project_id: Uuid,
        limit: usize,
    ) -> Result<Vec<ActivityEvent>, StoreError> {
        let inner = self.inner.read().await;
        Ok(inner
            .events
            .iter()
            .rev()
            .filter(|e| e.project_id == project_id)
            .take(limit)
            .cloned()
            .collect())
    }

    async fn events_of_type(
        &self,
        project_id: Uuid,
        event_type: EventType,
    ) -> Result<Vec<ActivityEvent>, StoreError> {
        let inner = self.inner.read().await;
        Ok(inner
            .events
            .iter()
            .rev()
            .filter(|e| e.project_id == project_id && e.event_type == event_type)
            .cloned()
            .collect())
    }

    async fn resolve_event(
        &self,
        event_id: i64,
        response: Value,
        notes: Option<String>,
        responded_at: DateTime<Utc>,
    ) -> Result<ResolveOutcome, StoreError> {
        // Check-and-set under the write lock, so concurrent resolve
        // attempts serialize and exactly one of them applies.
        let mut inner = self.inner.write().await;
        let Some(event) = inner.events.iter_mut().find(|e| e.id == event_id) else {
            return Ok(ResolveOutcome::NotFound);
        };
        if event.is_resolved() {
            return Ok(ResolveOutcome::AlreadyResolved);
        }
        let Some(payload) = event.payload.as_object_mut() else {
            return Err(StoreError::Corrupt(format!(
                "event {} payload is not an object",
                event_id
            )));
        };
        payload.insert("resolved".into(), Value::Bool(true));
        payload.insert("response".into(), response);
        payload.insert(
            "response_notes".into(),
            notes.map(Value::String).unwrap_or(Value::Null),
        );
        payload.insert(
            "responded_at".into(),
            Value::String(responded_at.to_rfc3339()),
        );
        Ok(ResolveOutcome::Applied)
    }
}
