//! The job store interface shared by every component.

use async_trait::async_trait;
use microsim_core::error::CoreError;
use microsim_core::job::{Job, JobInputs, Transition};
use microsim_core::types::{JobId, Timestamp};

use crate::models::job::JobListQuery;

/// Result of [`JobStore::create_if_absent`].
#[derive(Debug, Clone)]
pub struct CreateOutcome {
    pub job: Job,
    /// `true` when this call inserted the row, `false` when it already existed.
    pub created: bool,
}

/// Result of [`JobStore::transition`].
#[derive(Debug, Clone)]
pub struct TransitionOutcome {
    /// The job after the transition.
    pub job: Job,
    /// `false` when the transition was an idempotent retry of one already applied.
    pub changed: bool,
}

/// Persistence for job records. Single source of truth for job state.
///
/// Errors: [`CoreError::StorageUnavailable`] for persistence failures,
/// [`CoreError::NotFound`] for unknown ids, [`CoreError::InvalidTransition`]
/// for state-machine violations.
#[async_trait]
pub trait JobStore: Send + Sync {
    /// Atomically return the existing job with `id`, or insert a new
    /// `pending` job. Concurrent callers with the same id observe exactly one
    /// `created = true`.
    async fn create_if_absent(&self, id: JobId, inputs: &JobInputs)
        -> Result<CreateOutcome, CoreError>;

    async fn get(&self, id: JobId) -> Result<Job, CoreError>;

    /// Apply `transition` at time `at`, enforcing the forward-only state
    /// machine. Transitions for one id are applied in arrival order.
    async fn transition(
        &self,
        id: JobId,
        transition: Transition,
        at: Timestamp,
    ) -> Result<TransitionOutcome, CoreError>;

    /// Read-only enumeration in creation order.
    async fn list(&self, query: &JobListQuery) -> Result<Vec<Job>, CoreError>;

    /// Whether the underlying persistence layer is reachable.
    async fn is_healthy(&self) -> bool;
}
