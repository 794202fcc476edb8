use thiserror::Error;

use crate::store::StoreError;

/// Failures surfaced by the execution status engine.
///
/// The variants are the caller's retry contract: `Storage` may clear
/// up on retry; the other three are definitive and retrying is
/// pointless. Nothing is retried internally.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("{what} {id} not found")]
    NotFound { what: &'static str, id: String },

    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("response {0} already resolved")]
    AlreadyResolved(String),

    #[error("storage failure: {0}")]
    Storage(#[from] StoreError),
}

impl EngineError {
    pub fn not_found(what: &'static str, id: impl std::fmt::Display) -> Self {
        EngineError::NotFound {
            what,
            id: id.to_string(),
        }
    }
}
