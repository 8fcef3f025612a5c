//! Hands pending jobs to the compute collaborator.
//!
//! The `pending -> running` transition is taken before the compute call and
//! doubles as the claim: the store applies it at most once per job, so
//! concurrent dispatch attempts for the same job spawn compute exactly once.

use std::sync::Arc;

use microsim_compute::{ComputeBackend, ComputeRequest};
use microsim_core::error::CoreError;
use microsim_core::job::{Job, JobStatus, Transition};

use crate::lifecycle::JobLifecycle;

/// Outcome of [`ComputeDispatcher::dispatch`].
#[derive(Debug, Clone, PartialEq)]
pub enum Dispatch {
    /// Compute was spawned; the job is `running`.
    Spawned,
    /// The compute call could not be made; the job is now `failed`.
    Failed { error_message: String },
    /// Another caller already claimed the job, or it is no longer pending.
    Skipped { status: JobStatus },
}

#[derive(Clone)]
pub struct ComputeDispatcher {
    lifecycle: JobLifecycle,
    backend: Arc<dyn ComputeBackend>,
}

impl ComputeDispatcher {
    pub fn new(lifecycle: JobLifecycle, backend: Arc<dyn ComputeBackend>) -> Self {
        Self { lifecycle, backend }
    }

    /// Mark `job` running and spawn its compute without waiting for it.
    ///
    /// Only call this for a job the caller just created, or for a composite
    /// whose prerequisites have all completed.
    pub async fn dispatch(&self, job: &Job) -> Result<Dispatch, CoreError> {
        let claimed = match self.lifecycle.transition(job.id, Transition::Running).await {
            Ok(outcome) if outcome.changed => outcome.job,
            Ok(outcome) => {
                return Ok(Dispatch::Skipped {
                    status: outcome.job.status,
                })
            }
            Err(CoreError::InvalidTransition { from, .. }) => {
                return Ok(Dispatch::Skipped { status: from });
            }
            Err(e) => return Err(e),
        };

        let request = ComputeRequest::for_job(&claimed);
        match self.backend.spawn(&request).await {
            Ok(()) => {
                tracing::info!(
                    job_id = %claimed.id,
                    function = %request.function,
                    "Job dispatched",
                );
                Ok(Dispatch::Spawned)
            }
            Err(e) => {
                let error_message = CoreError::DispatchFailed(e.to_string()).to_string();
                tracing::error!(
                    job_id = %claimed.id,
                    function = %request.function,
                    error = %e,
                    "Failed to spawn compute",
                );
                self.fail(&claimed, &error_message).await?;
                Ok(Dispatch::Failed { error_message })
            }
        }
    }

    /// Record a dispatch failure, unless the collaborator already reported
    /// a terminal state for the job.
    async fn fail(&self, job: &Job, error_message: &str) -> Result<(), CoreError> {
        match self
            .lifecycle
            .transition(job.id, Transition::failed(error_message))
            .await
        {
            Ok(_) => Ok(()),
            Err(CoreError::InvalidTransition { from, .. }) => {
                tracing::warn!(
                    job_id = %job.id,
                    status = %from,
                    "Job finished before its dispatch failure was recorded",
                );
                Ok(())
            }
            Err(e) => Err(e),
        }
    }
}
