use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Externally visible execution phase of a project.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionPhase {
    Idle,
    Running,
    Paused,
    Stopped,
    Completed,
    Error,
}

impl ExecutionPhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExecutionPhase::Idle => "idle",
            ExecutionPhase::Running => "running",
            ExecutionPhase::Paused => "paused",
            ExecutionPhase::Stopped => "stopped",
            ExecutionPhase::Completed => "completed",
            ExecutionPhase::Error => "error",
        }
    }
}

impl std::fmt::Display for ExecutionPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Read-only projection of a project's execution state.
///
/// Derived from the task counters and the recent activity log, never
/// stored. `progress` is `round(100 * completed / total)`, 0 when the
/// project has no tasks.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionStatus {
    pub phase: ExecutionPhase,
    /// Task the execution is focused on, when the phase-defining event
    /// carried one
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current_task_id: Option<Uuid>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub paused_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stopped_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
    pub total_tasks: usize,
    pub completed_tasks: usize,
    /// 0..=100
    pub progress: u8,
    /// Display sentence for the dashboard header
    pub message: String,
}

/// Integer progress percentage; 0 when there are no tasks.
pub(crate) fn progress_percent(completed: usize, total: usize) -> u8 {
    if total == 0 {
        0
    } else {
        ((100.0 * completed as f64 / total as f64).round()) as u8
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn progress_zero_tasks_is_zero() {
        assert_eq!(progress_percent(0, 0), 0);
    }

    #[test]
    fn progress_rounds() {
        assert_eq!(progress_percent(1, 3), 33);
        assert_eq!(progress_percent(2, 3), 67);
        assert_eq!(progress_percent(4, 4), 100);
        assert_eq!(progress_percent(0, 4), 0);
    }
}
