use crate::job::JobStatus;
use crate::types::JobId;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum CoreError {
    #[error("Entity not found: {entity} with id {id}")]
    NotFound { entity: &'static str, id: JobId },

    /// A state-machine violation. Never retried.
    #[error("Invalid transition for job {id}: {from} -> {to}")]
    InvalidTransition {
        id: JobId,
        from: JobStatus,
        to: JobStatus,
    },

    /// Transient persistence failure; idempotent operations may be retried.
    #[error("Storage unavailable: {0}")]
    StorageUnavailable(String),

    /// The external compute surface could not be invoked.
    #[error("Dispatch failed: {0}")]
    DispatchFailed(String),

    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl CoreError {
    /// Shorthand for the common "unknown job id" case.
    pub fn job_not_found(id: JobId) -> Self {
        CoreError::NotFound { entity: "Job", id }
    }
}

impl From<validator::ValidationErrors> for CoreError {
    fn from(errors: validator::ValidationErrors) -> Self {
        CoreError::Validation(errors.to_string())
    }
}
