//! Repository error types.

use thiserror::Error;

use crate::models::JobStatus;

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("Database error: {0}")]
    Database(#[from] diesel::result::Error),

    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    /// The row could not be written or read back after writing.
    #[error("Failed to {action} record in {table}")]
    WriteFailed {
        action: &'static str,
        table: &'static str,
    },

    #[error("Duplicate {entity}: {key}")]
    Duplicate { entity: &'static str, key: String },

    #[error("Invalid job status transition: {from} -> {to}")]
    InvalidTransition { from: JobStatus, to: JobStatus },

    /// Optimistic update kept losing to concurrent writers.
    #[error("Concurrent update conflict on {entity} {id}")]
    Conflict { entity: &'static str, id: String },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl RepositoryError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

pub type Result<T> = std::result::Result<T, RepositoryError>;
