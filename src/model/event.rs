use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// The closed activity event vocabulary.
///
/// Event types arriving over the API are parsed strictly; anything
/// outside this set is rejected at the boundary.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    ExecutionStarted,
    ExecutionPaused,
    ExecutionStopped,
    ExecutionCompleted,
    Error,
    DecisionNeeded,
    ApprovalNeeded,
    TaskCreated,
    TaskUpdated,
    TaskCompleted,
    Activity,
}

impl EventType {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventType::ExecutionStarted => "execution_started",
            EventType::ExecutionPaused => "execution_paused",
            EventType::ExecutionStopped => "execution_stopped",
            EventType::ExecutionCompleted => "execution_completed",
            EventType::Error => "error",
            EventType::DecisionNeeded => "decision_needed",
            EventType::ApprovalNeeded => "approval_needed",
            EventType::TaskCreated => "task_created",
            EventType::TaskUpdated => "task_updated",
            EventType::TaskCompleted => "task_completed",
            EventType::Activity => "activity",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "execution_started" => Some(EventType::ExecutionStarted),
            "execution_paused" => Some(EventType::ExecutionPaused),
            "execution_stopped" => Some(EventType::ExecutionStopped),
            "execution_completed" => Some(EventType::ExecutionCompleted),
            "error" => Some(EventType::Error),
            "decision_needed" => Some(EventType::DecisionNeeded),
            "approval_needed" => Some(EventType::ApprovalNeeded),
            "task_created" => Some(EventType::TaskCreated),
            "task_updated" => Some(EventType::TaskUpdated),
            "task_completed" => Some(EventType::TaskCompleted),
            "activity" => Some(EventType::Activity),
            _ => None,
        }
    }

    /// Whether this event type fixes the execution phase during
    /// status reconstruction.
    pub fn is_phase_defining(&self) -> bool {
        matches!(
            self,
            EventType::ExecutionStarted
                | EventType::ExecutionPaused
                | EventType::ExecutionStopped
                | EventType::ExecutionCompleted
                | EventType::Error
        )
    }
}

impl std::fmt::Display for EventType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A stored activity event.
///
/// Immutable once appended, with one exception: the Response Resolver
/// may merge resolution fields into `payload` exactly once (guarded by
/// the store's conditional update). `id` is assigned by the store in
/// insertion order, so ordering by `id` is the log's total order even
/// when timestamps collide.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActivityEvent {
    pub id: i64,
    pub project_id: Uuid,
    pub event_type: EventType,
    pub timestamp: DateTime<Utc>,
    /// Structured payload; field semantics depend on `event_type`
    pub payload: serde_json::Value,
    /// Optional human-readable rationale
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rationale: Option<String>,
}

impl ActivityEvent {
    /// Whether a pending decision/approval/error has been answered.
    pub fn is_resolved(&self) -> bool {
        self.payload
            .get("resolved")
            .and_then(|v| v.as_bool())
            .unwrap_or(false)
    }

    /// String payload field accessor (e.g. `decision_id`).
    pub fn payload_str(&self, field: &str) -> Option<&str> {
        self.payload.get(field).and_then(|v| v.as_str())
    }
}
