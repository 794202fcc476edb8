use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Task status enumeration (the kanban columns).
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    /// Not started yet
    Todo,
    /// An agent (or human) is working on it
    InProgress,
    /// Finished — feeds the completion counters
    Done,
    /// Stuck, waiting on something external
    Blocked,
}

impl TaskStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::Todo => "todo",
            TaskStatus::InProgress => "in_progress",
            TaskStatus::Done => "done",
            TaskStatus::Blocked => "blocked",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "todo" => Some(TaskStatus::Todo),
            "in_progress" => Some(TaskStatus::InProgress),
            "done" => Some(TaskStatus::Done),
            "blocked" => Some(TaskStatus::Blocked),
            _ => None,
        }
    }
}

impl std::fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A coding task belonging to exactly one project.
///
/// Created by an external actor (human or agent); this core only reads
/// tasks to aggregate completion counters. `position` gives a stable
/// ordering within a status column.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    pub id: Uuid,
    pub project_id: Uuid,
    /// Free-form tag (e.g. "backend", "refactor")
    pub category: String,
    pub description: String,
    /// Ordered step descriptions, for display
    #[serde(default)]
    pub steps: Vec<String>,
    pub status: TaskStatus,
    /// Stable ordering within the status column
    pub position: i64,
    /// Free-text notes left by the executing agent
    #[serde(skip_serializing_if = "Option::is_none")]
    pub agent_notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
