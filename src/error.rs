//! Error taxonomy for orchestration operations.
//!
//! Every external call site resolves to one of two decisions: abort the
//! whole operation (the variants here, folded into a failed `TaskResult` at
//! the operation boundary) or isolate-and-record (counted in the per-item
//! stats, never raised). Expected per-item problems are never surfaced as an
//! `Err` to callers.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum TaskError {
    #[error("collection {0} not found")]
    NotFound(String),

    #[error("collection {0} is deleted")]
    AlreadyDeleted(String),

    #[error("collection {0} not found or not ready")]
    NotReady(String),

    #[error("collection {0} is not an object storage or anybase collection")]
    UnsupportedSourceKind(String),

    #[error("{subsystem} failure: {source}")]
    Subsystem {
        subsystem: &'static str,
        #[source]
        source: anyhow::Error,
    },
}

impl TaskError {
    pub fn subsystem(subsystem: &'static str, source: anyhow::Error) -> Self {
        TaskError::Subsystem { subsystem, source }
    }
}
