//! SQLite-backed dashboard store.
//!
//! One connection behind a mutex; every call hops to the blocking
//! pool. The conditional resolve is a single `UPDATE ... WHERE` so
//! the resolved check and the write cannot interleave with another
//! resolve attempt.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use serde_json::Value;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::Mutex;
use uuid::Uuid;

use super::{DashboardStore, NewTask, ResolveOutcome, StoreError, TaskPatch};
use crate::model::{ActivityEvent, EventType, Project, Task, TaskStatus};

const SCHEMA: &str = r#"
PRAGMA journal_mode = WAL;
PRAGMA foreign_keys = ON;

CREATE TABLE IF NOT EXISTS projects (
    id TEXT PRIMARY KEY NOT NULL,
    name TEXT NOT NULL,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_projects_updated_at ON projects(updated_at DESC);

CREATE TABLE IF NOT EXISTS tasks (
    id TEXT PRIMARY KEY NOT NULL,
    project_id TEXT NOT NULL,
    category TEXT NOT NULL,
    description TEXT NOT NULL,
    steps TEXT NOT NULL DEFAULT '[]',
    status TEXT NOT NULL DEFAULT 'todo',
    position INTEGER NOT NULL DEFAULT 0,
    agent_notes TEXT,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL,
    FOREIGN KEY (project_id) REFERENCES projects(id) ON DELETE CASCADE
);

CREATE INDEX IF NOT EXISTS idx_tasks_project ON tasks(project_id, status, position);

CREATE TABLE IF NOT EXISTS activity_events (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    project_id TEXT NOT NULL,
    event_type TEXT NOT NULL,
    timestamp TEXT NOT NULL,
    payload TEXT NOT NULL DEFAULT '{}',
    rationale TEXT,
    FOREIGN KEY (project_id) REFERENCES projects(id) ON DELETE CASCADE
);

CREATE INDEX IF NOT EXISTS idx_events_project ON activity_events(project_id, id);
CREATE INDEX IF NOT EXISTS idx_events_type ON activity_events(project_id, event_type);
"#;

pub struct SqliteStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteStore {
    pub async fn open(db_path: PathBuf) -> Result<Self, StoreError> {
        if let Some(parent) = db_path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent)
                    .await
                    .map_err(|e| StoreError::Database(format!("create db dir: {}", e)))?;
            }
        }

        let conn = tokio::task::spawn_blocking(move || {
            let conn = Connection::open(&db_path)
                .map_err(|e| StoreError::Database(format!("open database: {}", e)))?;
            conn.execute_batch(SCHEMA)
                .map_err(|e| StoreError::Database(format!("run schema: {}", e)))?;
            Ok::<_, StoreError>(conn)
        })
        .await
        .map_err(|e| StoreError::Database(format!("task join error: {}", e)))??;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }
}

fn db_err(e: rusqlite::Error) -> StoreError {
    StoreError::Database(e.to_string())
}

fn parse_timestamp(s: &str) -> Result<DateTime<Utc>, StoreError> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| StoreError::Corrupt(format!("bad timestamp {:?}: {}", s, e)))
}

fn parse_uuid(s: &str) -> Result<Uuid, StoreError> {
    Uuid::parse_str(s).map_err(|e| StoreError::Corrupt(format!("bad uuid {:?}: {}", s, e)))
}

/// Raw row images, converted to domain types outside the rusqlite
/// closures so parse failures surface as `StoreError::Corrupt`.
struct ProjectRow {
    id: String,
    name: String,
    created_at: String,
    updated_at: String,
}

impl ProjectRow {
    fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            name: row.get(1)?,
            created_at: row.get(2)?,
            updated_at: row.get(3)?,
        })
    }

    fn into_project(self) -> Result<Project, StoreError> {
        Ok(Project {
            id: parse_uuid(&self.id)?,
            name: self.name,
            created_at: parse_timestamp(&self.created_at)?,
            updated_at: parse_timestamp(&self.updated_at)?,
        })
    }
}

struct TaskRow {
    id: String,
    project_id: String,
    category: String,
    description: String,
    steps: String,
    status: String,
    position: i64,
    agent_notes: Option<String>,
    created_at: String,
    updated_at: String,
}

impl TaskRow {
    fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            project_id: row.get(1)?,
            category: row.get(2)?,
            description: row.get(3)?,
            steps: row.get(4)?,
            status: row.get(5)?,
            position: row.get(6)?,
            agent_notes: row.get(7)?,
            created_at: row.get(8)?,
            updated_at: row.get(9)?,
        })
    }

    fn into_task(self) -> Result<Task, StoreError> {
        let status = TaskStatus::parse(&self.status)
            .ok_or_else(|| StoreError::Corrupt(format!("bad task status {:?}", self.status)))?;
        let steps: Vec<String> = serde_json::from_str(&self.steps)
            .map_err(|e| StoreError::Corrupt(format!("bad task steps: {}", e)))?;
        Ok(Task {
            id: parse_uuid(&self.id)?,
            project_id: parse_uuid(&self.project_id)?,
            category: self.category,
            description: self.description,
            steps,
            status,
            position: self.position,
            agent_notes: self.agent_notes,
            created_at: parse_timestamp(&self.created_at)?,
            updated_at: parse_timestamp(&self.updated_at)?,
        })
    }
}

struct EventRow {
    id: i64,
    project_id: String,
    event_type: String,
    timestamp: String,
    payload: String,
    rationale: Option<String>,
}

impl EventRow {
    fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            project_id: row.get(1)?,
            event_type: row.get(2)?,
            timestamp: row.get(3)?,
            payload: row.get(4)?,
            rationale: row.get(5)?,
        })
    }

    fn into_event(self) -> Result<ActivityEvent, StoreError> {
        let event_type = EventType::parse(&self.event_type).ok_or_else(|| {
            StoreError::Corrupt(format!("unknown event type {:?}", self.event_type))
        })?;
        let payload: Value = serde_json::from_str(&self.payload)
            .map_err(|e| StoreError::Corrupt(format!("bad event payload: {}", e)))?;
        Ok(ActivityEvent {
            id: self.id,
            project_id: parse_uuid(&self.project_id)?,
            event_type,
            timestamp: parse_timestamp(&self.timestamp)?,
            payload,
            rationale: self.rationale,
        })
    }
}

const TASK_COLUMNS: &str =
    "id, project_id, category, description, steps, status, position, agent_notes, created_at, updated_at";

const EVENT_COLUMNS: &str = "id, project_id, event_type, timestamp, payload, rationale";

#[async_trait]
impl DashboardStore for SqliteStore {
    fn is_persistent(&self) -> bool {
        true
    }

    async fn list_projects(&self) -> Result<Vec<Project>, StoreError> {
        let conn = self.conn.clone();
        tokio::task::spawn_blocking(move || {
            let conn = conn.blocking_lock();
            let mut stmt = conn
                .prepare(
                    "SELECT id, name, created_at, updated_at FROM projects
                     ORDER BY updated_at DESC",
                )
                .map_err(db_err)?;
            let rows = stmt
                .query_map([], ProjectRow::from_row)
                .map_err(db_err)?
                .collect::<Result<Vec<_>, _>>()
                .map_err(db_err)?;
            rows.into_iter().map(ProjectRow::into_project).collect()
        })
        .await
        .map_err(|e| StoreError::Database(format!("task join error: {}", e)))?
    }

    async fn get_project(&self, id: Uuid) -> Result<Option<Project>, StoreError> {
        let conn = self.conn.clone();
        let id_str = id.to_string();
        tokio::task::spawn_blocking(move || {
            let conn = conn.blocking_lock();
            let row = conn
                .query_row(
                    "SELECT id, name, created_at, updated_at FROM projects WHERE id = ?1",
                    params![&id_str],
                    ProjectRow::from_row,
                )
                .optional()
                .map_err(db_err)?;
            row.map(ProjectRow::into_project).transpose()
        })
        .await
        .map_err(|e| StoreError::Database(format!("task join error: {}", e)))?
    }

    async fn create_project(&self, name: &str) -> Result<Project, StoreError> {
        let conn = self.conn.clone();
        let now = Utc::now();
        let project = Project {
            id: Uuid::new_v4(),
            name: name.to_string(),
            created_at: now,
            updated_at: now,
        };
        let row = (
            project.id.to_string(),
            project.name.clone(),
            now.to_rfc3339(),
        );
        tokio::task::spawn_blocking(move || {
            let conn = conn.blocking_lock();
            conn.execute(
                "INSERT INTO projects (id, name, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?3)",
                params![row.0, row.1, row.2],
            )
            .map_err(db_err)?;
            Ok::<_, StoreError>(())
        })
        .await
        .map_err(|e| StoreError::Database(format!("task join error: {}", e)))??;
        Ok(project)
    }

    async fn rename_project(&self, id: Uuid, name: &str) -> Result<bool, StoreError> {
        let conn = self.conn.clone();
        let id_str = id.to_string();
        let name = name.to_string();
        let now = Utc::now().to_rfc3339();
        tokio::task::spawn_blocking(move || {
            let conn = conn.blocking_lock();
            let changed = conn
                .execute(
                    "UPDATE projects SET name = ?2, updated_at = ?3 WHERE id = ?1",
                    params![id_str, name, now],
                )
                .map_err(db_err)?;
            Ok(changed > 0)
        })
        .await
        .map_err(|e| StoreError::Database(format!("task join error: {}", e)))?
    }

    async fn delete_project(&self, id: Uuid) -> Result<bool, StoreError> {
        let conn = self.conn.clone();
        let id_str = id.to_string();
        tokio::task::spawn_blocking(move || {
            let conn = conn.blocking_lock();
            let changed = conn
                .execute("DELETE FROM projects WHERE id = ?1", params![id_str])
                .map_err(db_err)?;
            Ok(changed > 0)
        })
        .await
        .map_err(|e| StoreError::Database(format!("task join error: {}", e)))?
    }

    async fn list_tasks(&self, project_id: Uuid) -> Result<Vec<Task>, StoreError> {
        let conn = self.conn.clone();
        let project_str = project_id.to_string();
        tokio::task::spawn_blocking(move || {
            let conn = conn.blocking_lock();
            let mut stmt = conn
                .prepare(&format!(
                    "SELECT {TASK_COLUMNS} FROM tasks
                     WHERE project_id = ?1
                     ORDER BY status, position"
                ))
                .map_err(db_err)?;
            let rows = stmt
                .query_map(params![project_str], TaskRow::from_row)
                .map_err(db_err)?
                .collect::<Result<Vec<_>, _>>()
                .map_err(db_err)?;
            rows.into_iter().map(TaskRow::into_task).collect()
        })
        .await
        .map_err(|e| StoreError::Database(format!("task join error: {}", e)))?
    }

    async fn get_task(
        &self,
        project_id: Uuid,
        task_id: Uuid,
    ) -> Result<Option<Task>, StoreError> {
        let conn = self.conn.clone();
        let project_str = project_id.to_string();
        let task_str = task_id.to_string();
        tokio::task::spawn_blocking(move || {
            let conn = conn.blocking_lock();
            let row = conn
                .query_row(
                    &format!(
                        "SELECT {TASK_COLUMNS} FROM tasks WHERE id = ?1 AND project_id = ?2"
                    ),
                    params![task_str, project_str],
                    TaskRow::from_row,
                )
                .optional()
                .map_err(db_err)?;
            row.map(TaskRow::into_task).transpose()
        })
        .await
        .map_err(|e| StoreError::Database(format!("task join error: {}", e)))?
    }

    async fn create_task(&self, project_id: Uuid, new: NewTask) -> Result<Task, StoreError> {
        let conn = self.conn.clone();
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
        let steps_json = serde_json::to_string(&task.steps)
            .map_err(|e| StoreError::Corrupt(format!("serialize steps: {}", e)))?;
        let row = (
            task.id.to_string(),
            task.project_id.to_string(),
            task.category.clone(),
            task.description.clone(),
            steps_json,
            task.status.as_str(),
            task.position,
            now.to_rfc3339(),
        );
        tokio::task::spawn_blocking(move || {
            let conn = conn.blocking_lock();
            conn.execute(
                "INSERT INTO tasks
                     (id, project_id, category, description, steps, status, position,
                      created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?8)",
                params![row.0, row.1, row.2, row.3, row.4, row.5, row.6, row.7],
            )
            .map_err(db_err)?;
            Ok::<_, StoreError>(())
        })
        .await
        .map_err(|e| StoreError::Database(format!("task join error: {}", e)))??;
        Ok(task)
    }

    async fn update_task(
        &self,
        project_id: Uuid,
        task_id: Uuid,
        patch: TaskPatch,
    ) -> Result<Option<Task>, StoreError> {
        let conn = self.conn.clone();
        let project_str = project_id.to_string();
        let task_str = task_id.to_string();
        let now = Utc::now().to_rfc3339();
        let steps_json = match &patch.steps {
            Some(steps) => Some(
                serde_json::to_string(steps)
                    .map_err(|e| StoreError::Corrupt(format!("serialize steps: {}", e)))?,
            ),
            None => None,
        };
        let status_str = patch.status.map(|s| s.as_str().to_string());
        tokio::task::spawn_blocking(move || {
            let conn = conn.blocking_lock();
            let changed = conn
                .execute(
                    "UPDATE tasks SET
                         category = COALESCE(?3, category),
                         description = COALESCE(?4, description),
                         steps = COALESCE(?5, steps),
                         status = COALESCE(?6, status),
                         position = COALESCE(?7, position),
                         agent_notes = COALESCE(?8, agent_notes),
                         updated_at = ?9
                     WHERE id = ?1 AND project_id = ?2",
                    params![
                        task_str,
                        project_str,
                        patch.category,
                        patch.description,
                        steps_json,
                        status_str,
                        patch.position,
                        patch.agent_notes,
                        now
                    ],
                )
                .map_err(db_err)?;
            if changed == 0 {
                return Ok(None);
            }
            let row = conn
                .query_row(
                    &format!(
                        "SELECT {TASK_COLUMNS} FROM tasks WHERE id = ?1 AND project_id = ?2"
                    ),
                    params![task_str, project_str],
                    TaskRow::from_row,
                )
                .optional()
                .map_err(db_err)?;
            row.map(TaskRow::into_task).transpose()
        })
        .await
        .map_err(|e| StoreError::Database(format!("task join error: {}", e)))?
    }

    async fn delete_task(&self, project_id: Uuid, task_id: Uuid) -> Result<bool, StoreError> {
        let conn = self.conn.clone();
        let project_str = project_id.to_string();
        let task_str = task_id.to_string();
        tokio::task::spawn_blocking(move || {
            let conn = conn.blocking_lock();
            let changed = conn
                .execute(
                    "DELETE FROM tasks WHERE id = ?1 AND project_id = ?2",
                    params![task_str, project_str],
                )
                .map_err(db_err)?;
            Ok(changed > 0)
        })
        .await
        .map_err(|e| StoreError::Database(format!("task join error: {}", e)))?
    }

    async fn append_event(
        &self,
        project_id: Uuid,
        event_type: EventType,
        payload: Value,
        rationale: Option<String>,
    ) -> Result<ActivityEvent, StoreError> {
        let conn = self.conn.clone();
        let now = Utc::now();
        let project_str = project_id.to_string();
        let payload_json = payload.to_string();
        let now_str = now.to_rfc3339();
        let payload_clone = payload.clone();
        let rationale_clone = rationale.clone();
        let id = tokio::task::spawn_blocking(move || {
            let conn = conn.blocking_lock();
            conn.execute(
                "INSERT INTO activity_events (project_id, event_type, timestamp, payload, rationale)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![project_str, event_type.as_str(), now_str, payload_json, rationale_clone],
            )
            .map_err(db_err)?;
            Ok::<_, StoreError>(conn.last_insert_rowid())
        })
        .await
        .map_err(|e| StoreError::Database(format!("task join error: {}", e)))??;
        Ok(ActivityEvent {
            id,
            project_id,
            event_type,
            timestamp: now,
            payload: payload_clone,
            rationale,
        })
    }

    async fn recent_events(
        &self,
        project_id: Uuid,
        limit: usize,
    ) -> Result<Vec<ActivityEvent>, StoreError> {
        let conn = self.conn.clone();
        let project_str = project_id.to_string();
        tokio::task::spawn_blocking(move || {
            let conn = conn.blocking_lock();
            // Ordered by rowid, not timestamp: insertion order breaks
            // timestamp ties.
            let mut stmt = conn
                .prepare(&format!(
                    "SELECT {EVENT_COLUMNS} FROM activity_events
                     WHERE project_id = ?1
                     ORDER BY id DESC
                     LIMIT ?2"
                ))
                .map_err(db_err)?;
            let rows = stmt
                .query_map(params![project_str, limit as i64], EventRow::from_row)
                .map_err(db_err)?
                .collect::<Result<Vec<_>, _>>()
                .map_err(db_err)?;
            rows.into_iter().map(EventRow::into_event).collect()
        })
        .await
        .map_err(|e| StoreError::Database(format!("task join error: {}", e)))?
    }

    async fn events_of_type(
        &self,
        project_id: Uuid,
        event_type: EventType,
    ) -> Result<Vec<ActivityEvent>, StoreError> {
        let conn = self.conn.clone();
        let project_str = project_id.to_string();
        tokio::task::spawn_blocking(move || {
            let conn = conn.blocking_lock();
            let mut stmt = conn
                .prepare(&format!(
                    "SELECT {EVENT_COLUMNS} FROM activity_events
                     WHERE project_id = ?1 AND event_type = ?2
                     ORDER BY id DESC"
                ))
                .map_err(db_err)?;
            let rows = stmt
                .query_map(params![project_str, event_type.as_str()], EventRow::from_row)
                .map_err(db_err)?
                .collect::<Result<Vec<_>, _>>()
                .map_err(db_err)?;
            rows.into_iter().map(EventRow::into_event).collect()
        })
        .await
        .map_err(|e| StoreError::Database(format!("task join error: {}", e)))?
    }

    async fn resolve_event(
        &self,
        event_id: i64,
        response: Value,
        notes: Option<String>,
        responded_at: DateTime<Utc>,
    ) -> Result<ResolveOutcome, StoreError> {
        let conn = self.conn.clone();
        let response_json = response.to_string();
        let responded_str = responded_at.to_rfc3339();
        tokio::task::spawn_blocking(move || {
            let conn = conn.blocking_lock();
            // Single conditional UPDATE: the resolved check and the
            // write happen in one statement, so two racing resolves
            // produce exactly one change.
            let changed = conn
                .execute(
                    "UPDATE activity_events
                     SET payload = json_set(payload,
                             '$.resolved', json('true'),
                             '$.response', json(?2),
                             '$.response_notes', ?3,
                             '$.responded_at', ?4)
                     WHERE id = ?1
                       AND COALESCE(json_extract(payload, '$.resolved'), 0) != 1",
                    params![event_id, response_json, notes, responded_str],
                )
                .map_err(db_err)?;
            if changed > 0 {
                return Ok(ResolveOutcome::Applied);
            }
            let exists = conn
                .prepare("SELECT 1 FROM activity_events WHERE id = ?1")
                .map_err(db_err)?
                .exists(params![event_id])
                .map_err(db_err)?;
            if exists {
                Ok(ResolveOutcome::AlreadyResolved)
            } else {
                Ok(ResolveOutcome::NotFound)
            }
        })
        .await
        .map_err(|e| StoreError::Database(format!("task join error: {}", e)))?
    }
}
