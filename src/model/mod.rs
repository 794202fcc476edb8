//! Domain types for the dashboard.
//!
//! Everything here is plain data: projects, their tasks, the
//! append-only activity log, and the derived execution status
//! projection. Persistence lives in `crate::store`.

mod event;
mod project;
mod status;
mod task;

pub use event::{ActivityEvent, EventType};
pub use project::Project;
pub(crate) use status::progress_percent;
pub use status::{ExecutionPhase, ExecutionStatus};
pub use task::{Task, TaskStatus};
