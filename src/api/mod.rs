//! HTTP API for the dashboard.
//!
//! ## Endpoints
//!
//! - `GET /api/health` - Health check
//! - `GET/POST /api/projects`, `GET/PATCH/DELETE /api/projects/{id}` - Project CRUD
//! - `GET /api/projects/{id}/activity` - Recent activity events
//! - `GET/POST /api/projects/{id}/tasks`,
//!   `GET/PATCH/DELETE /api/projects/{id}/tasks/{task_id}` - Task CRUD
//! - `GET  /api/projects/{id}/execution/status` - Reconstructed execution status
//! - `POST /api/projects/{id}/execution/start|pause|stop` - Phase transition requests
//! - `POST /api/projects/{id}/execution/respond` - Submit a human response

mod execution;
mod projects;
mod routes;
mod tasks;
pub mod types;

pub use routes::{router, serve, AppState};
pub use types::*;
