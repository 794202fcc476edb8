//! Dashboard storage with pluggable backends.
//!
//! Supports:
//! - `memory`: In-memory storage (non-persistent, for testing)
//! - `sqlite`: SQLite database, the default
//!
//! The activity log is append-only. The single permitted mutation of
//! an appended event is [`DashboardStore::resolve_event`], a narrow
//! conditional update that sets the resolution fields only if the
//! event is not already resolved. Everything else goes through
//! appends and plain row updates on projects/tasks.

mod memory;
mod sqlite;

pub use memory::MemoryStore;
pub use sqlite::SqliteStore;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;
use std::path::PathBuf;
use std::sync::Arc;
use thiserror::Error;
use uuid::Uuid;

use crate::model::{ActivityEvent, EventType, Project, Task, TaskStatus};

/// Storage-level failure. Retry may help; everything else in the
/// error taxonomy is a definitive answer.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(String),

    #[error("invalid stored data: {0}")]
    Corrupt(String),
}

/// Outcome of the conditional resolve on one event row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolveOutcome {
    /// The resolution fields were written; this caller won.
    Applied,
    /// The event was already resolved (possibly by a concurrent caller).
    AlreadyResolved,
    /// No event with that id exists.
    NotFound,
}

/// Fields for creating a task.
#[derive(Debug, Clone)]
pub struct NewTask {
    pub category: String,
    pub description: String,
    pub steps: Vec<String>,
    pub status: TaskStatus,
    pub position: i64,
}

/// Partial task update; `None` fields are left untouched.
#[derive(Debug, Clone, Default)]
pub struct TaskPatch {
    pub category: Option<String>,
    pub description: Option<String>,
    pub steps: Option<Vec<String>>,
    pub status: Option<TaskStatus>,
    pub position: Option<i64>,
    pub agent_notes: Option<String>,
}

/// Dashboard store trait - implemented by all storage backends.
///
/// Within one project, `append_event` and the event readers observe a
/// single total order (the store's insertion order, exposed as the
/// event id). Cross-project operations have no ordering relationship.
#[async_trait]
pub trait DashboardStore: Send + Sync {
    /// Whether this store persists data across restarts.
    fn is_persistent(&self) -> bool;

    // === Projects ===

    /// List projects, ordered by updated_at descending.
    async fn list_projects(&self) -> Result<Vec<Project>, StoreError>;

    async fn get_project(&self, id: Uuid) -> Result<Option<Project>, StoreError>;

    async fn create_project(&self, name: &str) -> Result<Project, StoreError>;

    /// Rename a project. Returns false if it does not exist.
    async fn rename_project(&self, id: Uuid, name: &str) -> Result<bool, StoreError>;

    /// Delete a project and everything hanging off it.
    async fn delete_project(&self, id: Uuid) -> Result<bool, StoreError>;

    // === Tasks (the Task Aggregate) ===

    /// List a project's tasks, ordered by (status, position).
    async fn list_tasks(&self, project_id: Uuid) -> Result<Vec<Task>, StoreError>;

    async fn get_task(&self, project_id: Uuid, task_id: Uuid)
        -> Result<Option<Task>, StoreError>;

    async fn create_task(&self, project_id: Uuid, new: NewTask) -> Result<Task, StoreError>;

    /// Apply a patch. Returns the updated task, or None if missing.
    async fn update_task(
        &self,
        project_id: Uuid,
        task_id: Uuid,
        patch: TaskPatch,
    ) -> Result<Option<Task>, StoreError>;

    async fn delete_task(&self, project_id: Uuid, task_id: Uuid) -> Result<bool, StoreError>;

    // === Activity log ===

    /// Append an event; the store assigns the id (insertion order) and
    /// the timestamp.
    async fn append_event(
        &self,
        project_id: Uuid,
        event_type: EventType,
        payload: Value,
        rationale: Option<String>,
    ) -> Result<ActivityEvent, StoreError>;

    /// Most recent events for a project, newest first. Ties between
    /// equal timestamps keep insertion order (ordering is by id).
    async fn recent_events(
        &self,
        project_id: Uuid,
        limit: usize,
    ) -> Result<Vec<ActivityEvent>, StoreError>;

    /// All events of one type for a project, newest first.
    async fn events_of_type(
        &self,
        project_id: Uuid,
        event_type: EventType,
    ) -> Result<Vec<ActivityEvent>, StoreError>;

    /// Conditionally mark an event resolved, merging `resolved=true`,
    /// `response`, `response_notes` and `responded_at` into its
    /// payload — only if `resolved` is not already true. This is the
    /// sole mutation of an appended event, and it is atomic with
    /// respect to concurrent resolve attempts on the same row.
    async fn resolve_event(
        &self,
        event_id: i64,
        response: Value,
        notes: Option<String>,
        responded_at: DateTime<Utc>,
    ) -> Result<ResolveOutcome, StoreError>;
}

/// Store backend selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StoreKind {
    Memory,
    #[default]
    Sqlite,
}

impl StoreKind {
    /// Parse from environment variable value.
    pub fn parse(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "memory" => Self::Memory,
            "sqlite" | "db" => Self::Sqlite,
            _ => Self::default(),
        }
    }
}

/// Create a store based on kind and configuration.
pub async fn create_store(
    kind: StoreKind,
    db_path: PathBuf,
) -> Result<Arc<dyn DashboardStore>, StoreError> {
    match kind {
        StoreKind::Memory => Ok(Arc::new(MemoryStore::new())),
        StoreKind::Sqlite => {
            let store = SqliteStore::open(db_path).await?;
            Ok(Arc::new(store))
        }
    }
}
