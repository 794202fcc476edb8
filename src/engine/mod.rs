//! Project execution status engine.
//!
//! Three pieces over one injected store:
//! - [`StatusReconstructor`]: derives the current phase from the most
//!   recent activity events plus task completion counters
//! - [`ResponseResolver`]: matches human answers to pending
//!   decision/approval/error events, exactly once each
//! - [`ExecutionController`]: start/pause/stop, as appended requests
//!
//! Reads flow log → reconstructor → caller; writes flow
//! controller/resolver → log. The engine never mutates tasks.

mod controller;
mod error;
mod resolver;
pub mod status;

pub use controller::{ExecutionController, StartOptions};
pub use error::EngineError;
pub use resolver::{ResponseResolver, ResponseType};
pub use status::{StatusReconstructor, DEFAULT_LOOKBACK};

use std::sync::Arc;

use serde_json::Value;
use uuid::Uuid;

use crate::model::ExecutionStatus;
use crate::store::DashboardStore;

/// Facade wiring the three engine components to one store.
#[derive(Clone)]
pub struct Engine {
    reconstructor: StatusReconstructor,
    resolver: ResponseResolver,
    controller: ExecutionController,
}

impl Engine {
    /// `lookback` bounds how many recent events a status read scans.
    pub fn new(store: Arc<dyn DashboardStore>, lookback: usize) -> Self {
        let reconstructor = StatusReconstructor::new(store.clone(), lookback);
        let resolver = ResponseResolver::new(store.clone());
        let controller = ExecutionController::new(store, reconstructor.clone());
        Self {
            reconstructor,
            resolver,
            controller,
        }
    }

    pub async fn status(&self, project_id: Uuid) -> Result<ExecutionStatus, EngineError> {
        self.reconstructor.status(project_id).await
    }

    pub async fn start(
        &self,
        project_id: Uuid,
        opts: StartOptions,
    ) -> Result<ExecutionStatus, EngineError> {
        self.controller.start(project_id, opts).await
    }

    pub async fn pause(&self, project_id: Uuid) -> Result<ExecutionStatus, EngineError> {
        self.controller.pause(project_id).await
    }

    pub async fn stop(&self, project_id: Uuid) -> Result<ExecutionStatus, EngineError> {
        self.controller.stop(project_id).await
    }

    pub async fn submit_response(
        &self,
        project_id: Uuid,
        response_type: &str,
        response_id: &str,
        value: Value,
        notes: Option<String>,
    ) -> Result<i64, EngineError> {
        self.resolver
            .submit(project_id, response_type, response_id, value, notes)
            .await
    }
}
