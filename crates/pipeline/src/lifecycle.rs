//! Job store access that announces every change on the event bus.

use std::sync::Arc;

use chrono::Utc;
use microsim_core::error::CoreError;
use microsim_core::job::{Job, JobInputs, Transition};
use microsim_core::types::JobId;
use microsim_db::models::job::JobListQuery;
use microsim_db::store::{CreateOutcome, JobStore, TransitionOutcome};
use microsim_events::{EventBus, PlatformEvent};

/// The job store plus lifecycle events.
///
/// Components that write jobs go through this so that subscribers (the
/// dependency sequencer in particular) observe each creation and each
/// status change exactly once. Idempotent retries publish nothing.
#[derive(Clone)]
pub struct JobLifecycle {
    store: Arc<dyn JobStore>,
    events: Arc<EventBus>,
}

impl JobLifecycle {
    pub fn new(store: Arc<dyn JobStore>, events: Arc<EventBus>) -> Self {
        Self { store, events }
    }

    pub fn store(&self) -> &Arc<dyn JobStore> {
        &self.store
    }

    pub fn events(&self) -> &Arc<EventBus> {
        &self.events
    }

    pub async fn create_if_absent(
        &self,
        id: JobId,
        inputs: &JobInputs,
    ) -> Result<CreateOutcome, CoreError> {
        let outcome = self.store.create_if_absent(id, inputs).await?;
        if outcome.created {
            tracing::info!(job_id = %id, kind = %outcome.job.kind, "Job created");
            self.events.publish(PlatformEvent::for_job(&outcome.job));
        } else {
            tracing::debug!(
                job_id = %id,
                status = %outcome.job.status,
                "Reusing existing job",
            );
        }
        Ok(outcome)
    }

    /// Apply `transition` now.
    pub async fn transition(
        &self,
        id: JobId,
        transition: Transition,
    ) -> Result<TransitionOutcome, CoreError> {
        let outcome = self.store.transition(id, transition, Utc::now()).await?;
        if outcome.changed {
            tracing::info!(job_id = %id, status = %outcome.job.status, "Job status changed");
            self.events.publish(PlatformEvent::for_job(&outcome.job));
        }
        Ok(outcome)
    }

    pub async fn get(&self, id: JobId) -> Result<Job, CoreError> {
        self.store.get(id).await
    }

    pub async fn list(&self, query: &JobListQuery) -> Result<Vec<Job>, CoreError> {
        self.store.list(query).await
    }
}
