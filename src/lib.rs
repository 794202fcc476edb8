//! # agentboard
//!
//! Web dashboard backend for tracking AI-agent coding tasks.
//!
//! This library provides:
//! - CRUD HTTP APIs for projects and their tasks
//! - An append-only per-project activity log
//! - The execution status engine: phase reconstruction from the log,
//!   start/pause/stop transition recording, and exactly-once
//!   resolution of pending human responses
//!
//! ## Architecture
//!
//! ```text
//!   HTTP handlers (api)
//!        │
//!        ▼
//!   Engine ── StatusReconstructor  (log → phase, read path)
//!        ├──  ResponseResolver     (human answer → one event, CAS)
//!        └──  ExecutionController  (start/pause/stop → appends)
//!        │
//!        ▼
//!   DashboardStore (memory | sqlite)
//! ```
//!
//! Agents and humans drive the execution externally; this service only
//! tracks and exposes its status. Nothing here schedules agent work or
//! retries model calls.
//!
//! ## Modules
//! - `api`: axum routes and handlers
//! - `engine`: the execution status engine
//! - `model`: domain types
//! - `store`: pluggable persistence

pub mod api;
pub mod config;
pub mod engine;
pub mod model;
pub mod store;

pub use config::Config;
pub use engine::{Engine, EngineError};
