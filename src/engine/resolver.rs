//! Human-in-the-loop response resolution.
//!
//! Agents park `decision_needed` / `approval_needed` / `error` events
//! in the log and wait for a human answer. Each such pending item is
//! answered at most once: the resolved flag is set through the
//! store's conditional update, so two near-simultaneous submissions
//! for the same item yield one winner and one `AlreadyResolved`.

use std::sync::Arc;

use serde_json::{json, Value};
use tracing::info;
use uuid::Uuid;

use super::EngineError;
use crate::model::EventType;
use crate::store::{DashboardStore, ResolveOutcome};

/// The kind of pending item a response targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseType {
    Decision,
    Approval,
    ErrorRecovery,
}

impl ResponseType {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "decision" => Some(ResponseType::Decision),
            "approval" => Some(ResponseType::Approval),
            "error_recovery" => Some(ResponseType::ErrorRecovery),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ResponseType::Decision => "decision",
            ResponseType::Approval => "approval",
            ResponseType::ErrorRecovery => "error_recovery",
        }
    }

    /// The event type this response targets and the payload field
    /// holding the pending item's identifier.
    fn target(&self) -> (EventType, &'static str) {
        match self {
            ResponseType::Decision => (EventType::DecisionNeeded, "decision_id"),
            ResponseType::Approval => (EventType::ApprovalNeeded, "approval_id"),
            ResponseType::ErrorRecovery => (EventType::Error, "error_id"),
        }
    }
}

#[derive(Clone)]
pub struct ResponseResolver {
    store: Arc<dyn DashboardStore>,
}

impl ResponseResolver {
    pub fn new(store: Arc<dyn DashboardStore>) -> Self {
        Self { store }
    }

    /// Submit a human response for a pending item.
    ///
    /// Returns the matched event's id. Fails with `InvalidRequest`
    /// for an unknown `response_type` (before any storage access),
    /// `NotFound` when the project or the pending item is missing,
    /// and `AlreadyResolved` when the item was answered before —
    /// including by a concurrent submission that won the race.
    pub async fn submit(
        &self,
        project_id: Uuid,
        response_type: &str,
        response_id: &str,
        value: Value,
        notes: Option<String>,
    ) -> Result<i64, EngineError> {
        let response_type = ResponseType::parse(response_type).ok_or_else(|| {
            EngineError::InvalidRequest(format!("unknown response type '{}'", response_type))
        })?;

        self.store
            .get_project(project_id)
            .await?
            .ok_or_else(|| EngineError::not_found("project", project_id))?;

        let (event_type, id_field) = response_type.target();
        let events = self.store.events_of_type(project_id, event_type).await?;
        let matched = events
            .iter()
            .find(|e| e.payload_str(id_field) == Some(response_id))
            .ok_or_else(|| EngineError::not_found("pending response", response_id))?;

        if matched.is_resolved() {
            return Err(EngineError::AlreadyResolved(response_id.to_string()));
        }

        // The pre-check above is advisory; the store's conditional
        // update is what actually decides the race.
        let outcome = self
            .store
            .resolve_event(matched.id, value.clone(), notes.clone(), chrono::Utc::now())
            .await?;
        match outcome {
            ResolveOutcome::Applied => {}
            ResolveOutcome::AlreadyResolved => {
                return Err(EngineError::AlreadyResolved(response_id.to_string()));
            }
            ResolveOutcome::NotFound => {
                return Err(EngineError::not_found("pending response", response_id));
            }
        }

        info!(
            project_id = %project_id,
            response_type = response_type.as_str(),
            response_id,
            event_id = matched.id,
            "response resolved"
        );

        // Audit trail: the resolution itself is recorded as a fresh
        // immutable event.
        self.store
            .append_event(
                project_id,
                EventType::Activity,
                json!({
                    "kind": "response_submitted",
                    "response_type": response_type.as_str(),
                    "response_id": response_id,
                    "event_id": matched.id,
                    "response": value,
                }),
                notes,
            )
            .await?;

        Ok(matched.id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    fn resolver(store: &MemoryStore) -> ResponseResolver {
        ResponseResolver::new(Arc::new(store.clone()))
    }

    #[tokio::test]
    async fn bogus_type_fails_before_storage() {
        let store = MemoryStore::new();
        // Even the project lookup is skipped: a missing project would
        // be NotFound, but the type check comes first.
        let err = resolver(&store)
            .submit(Uuid::new_v4(), "bogus", "d1", json!("yes"), None)
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::InvalidRequest(_)));
    }

    #[tokio::test]
    async fn missing_project_is_not_found() {
        let store = MemoryStore::new();
        let err = resolver(&store)
            .submit(Uuid::new_v4(), "decision", "d1", json!("yes"), None)
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::NotFound { what: "project", .. }));
    }

    #[tokio::test]
    async fn missing_pending_item_is_not_found() {
        let store = MemoryStore::new();
        let project = store.create_project("p").await.unwrap();
        let err = resolver(&store)
            .submit(project.id, "decision", "nope", json!("yes"), None)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            EngineError::NotFound {
                what: "pending response",
                ..
            }
        ));
    }

    #[tokio::test]
    async fn decision_resolves_once_then_already_resolved() {
        let store = MemoryStore::new();
        let project = store.create_project("p").await.unwrap();
        let event = store
            .append_event(
                project.id,
                EventType::DecisionNeeded,
                json!({"decision_id": "d1", "question": "ship it?"}),
                None,
            )
            .await
            .unwrap();

        let resolver = resolver(&store);
        let matched = resolver
            .submit(project.id, "decision", "d1", json!("approve"), Some("lgtm".into()))
            .await
            .unwrap();
        assert_eq!(matched, event.id);

        let err = resolver
            .submit(project.id, "decision", "d1", json!("deny"), None)
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::AlreadyResolved(_)));

        // Resolution landed on the event and an audit event followed.
        let decisions = store
            .events_of_type(project.id, EventType::DecisionNeeded)
            .await
            .unwrap();
        assert!(decisions[0].is_resolved());
        assert_eq!(decisions[0].payload["response"], json!("approve"));
        let audits = store
            .events_of_type(project.id, EventType::Activity)
            .await
            .unwrap();
        assert_eq!(audits.len(), 1);
        assert_eq!(audits[0].payload["response_id"], json!("d1"));
    }

    #[tokio::test]
    async fn approval_and_error_recovery_target_their_own_events() {
        let store = MemoryStore::new();
        let project = store.create_project("p").await.unwrap();
        let approval = store
            .append_event(
                project.id,
                EventType::ApprovalNeeded,
                json!({"approval_id": "a1"}),
                None,
            )
            .await
            .unwrap();
        let error = store
            .append_event(project.id, EventType::Error, json!({"error_id": "e1"}), None)
            .await
            .unwrap();

        let resolver = resolver(&store);
        assert_eq!(
            resolver
                .submit(project.id, "approval", "a1", json!(true), None)
                .await
                .unwrap(),
            approval.id
        );
        assert_eq!(
            resolver
                .submit(project.id, "error_recovery", "e1", json!("retry"), None)
                .await
                .unwrap(),
            error.id
        );

        // A decision response never matches an approval event.
        let err = resolver
            .submit(project.id, "decision", "a1", json!("x"), None)
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::NotFound { .. }));
    }

    #[tokio::test]
    async fn newest_matching_event_wins_when_ids_repeat() {
        let store = MemoryStore::new();
        let project = store.create_project("p").await.unwrap();
        store
            .append_event(
                project.id,
                EventType::DecisionNeeded,
                json!({"decision_id": "d1", "round": 1}),
                None,
            )
            .await
            .unwrap();
        let newer = store
            .append_event(
                project.id,
                EventType::DecisionNeeded,
                json!({"decision_id": "d1", "round": 2}),
                None,
            )
            .await
            .unwrap();

        let matched = resolver(&store)
            .submit(project.id, "decision", "d1", json!("ok"), None)
            .await
            .unwrap();
        assert_eq!(matched, newer.id);
    }

    #[tokio::test]
    async fn concurrent_submissions_have_exactly_one_winner() {
        let store = MemoryStore::new();
        let project = store.create_project("p").await.unwrap();
        store
            .append_event(
                project.id,
                EventType::ApprovalNeeded,
                json!({"approval_id": "a1"}),
                None,
            )
            .await
            .unwrap();

        let r1 = resolver(&store);
        let r2 = r1.clone();
        let p = project.id;
        let (first, second) = tokio::join!(
            tokio::spawn(async move { r1.submit(p, "approval", "a1", json!(true), None).await }),
            tokio::spawn(async move { r2.submit(p, "approval", "a1", json!(false), None).await }),
        );
        let results = [first.unwrap(), second.unwrap()];
        let wins = results.iter().filter(|r| r.is_ok()).count();
        assert_eq!(wins, 1, "exactly one submission must win: {:?}", results);
        assert!(results
            .iter()
            .any(|r| matches!(r, Err(EngineError::AlreadyResolved(_)))));
    }
}
