//! Composite jobs and their prerequisites.
//!
//! A composite stays `pending` until every prerequisite is terminal. If any
//! prerequisite failed, the composite fails without its own compute being
//! dispatched; once all have completed, it is dispatched like any other job.
//!
//! Progress is driven by lifecycle events from the [`EventBus`], with a
//! periodic sweep over pending composites to cover lagged receivers and jobs
//! finished by another process.

use std::sync::Arc;
use std::time::Duration;

use microsim_core::error::CoreError;
use microsim_core::identity;
use microsim_core::job::{
    CompositeInputs, Job, JobInputs, JobKind, JobStatus, TaxBenefitModel, Transition,
};
use microsim_core::types::JobId;
use microsim_db::models::job::{JobListQuery, MAX_LIMIT};
use microsim_events::{EventBus, PlatformEvent};
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::dispatcher::ComputeDispatcher;
use crate::lifecycle::JobLifecycle;
use crate::resolver::StatusResolver;

/// Default interval of the safety sweep.
pub const DEFAULT_SWEEP_INTERVAL: Duration = Duration::from_secs(5);

/// Kinds of composite job the sequencer can build.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompositeKind {
    EconomicImpact,
    HouseholdImpact,
}

/// Request for a composite over a baseline and a reform prerequisite.
#[derive(Debug, Clone)]
pub struct CompositeRequest {
    pub kind: CompositeKind,
    pub tax_benefit_model: TaxBenefitModel,
    pub label: String,
    pub baseline: JobInputs,
    pub reform: JobInputs,
}

/// Result of [`DependencySequencer::create_composite`].
#[derive(Debug, Clone)]
pub struct CompositeOutcome {
    /// The composite as it stands after creation.
    pub job: Job,
    pub created: bool,
    pub baseline: Job,
    pub reform: Job,
}

pub struct DependencySequencer {
    lifecycle: JobLifecycle,
    dispatcher: ComputeDispatcher,
    resolver: StatusResolver,
    sweep_interval: Duration,
}

impl DependencySequencer {
    pub fn new(
        lifecycle: JobLifecycle,
        dispatcher: ComputeDispatcher,
        resolver: StatusResolver,
    ) -> Self {
        Self {
            lifecycle,
            dispatcher,
            resolver,
            sweep_interval: DEFAULT_SWEEP_INTERVAL,
        }
    }

    pub fn with_sweep_interval(mut self, sweep_interval: Duration) -> Self {
        self.sweep_interval = sweep_interval;
        self
    }

    /// Create (or reuse) a job for `inputs`, dispatching it only when this
    /// call created it.
    pub async fn create_and_dispatch(&self, inputs: &JobInputs) -> Result<(Job, bool), CoreError> {
        let id = identity::derive_id(inputs).unwrap_or_else(Uuid::new_v4);
        let outcome = self.lifecycle.create_if_absent(id, inputs).await?;
        if !outcome.created {
            ensure_same_inputs(&outcome.job, inputs)?;
            return Ok((outcome.job, false));
        }
        self.dispatcher.dispatch(&outcome.job).await?;
        Ok((self.resolver.resolve(id).await?, true))
    }

    /// Create the baseline then the reform prerequisite, then the composite
    /// over both, and advance it as far as the prerequisites allow.
    pub async fn create_composite(&self, request: CompositeRequest) -> Result<CompositeOutcome, CoreError> {
        let (baseline, _) = self.create_and_dispatch(&request.baseline).await?;
        let (reform, _) = self.create_and_dispatch(&request.reform).await?;

        let composite = CompositeInputs {
            tax_benefit_model: request.tax_benefit_model,
            label: request.label,
            baseline_job_id: baseline.id,
            reform_job_id: reform.id,
        };
        let inputs = match request.kind {
            CompositeKind::EconomicImpact => JobInputs::EconomicImpact(composite),
            CompositeKind::HouseholdImpact => JobInputs::HouseholdImpact(composite),
        };
        let id = identity::derive_id(&inputs).unwrap_or_else(Uuid::new_v4);
        let created = self.lifecycle.create_if_absent(id, &inputs).await?;
        if !created.created {
            ensure_same_inputs(&created.job, &inputs)?;
        }

        let job = if created.job.status == JobStatus::Pending {
            self.advance(id).await?
        } else {
            created.job
        };

        // Prerequisites may have moved on while the composite was created.
        Ok(CompositeOutcome {
            job,
            created: created.created,
            baseline: self.resolver.resolve(baseline.id).await?,
            reform: self.resolver.resolve(reform.id).await?,
        })
    }

    /// Move a pending composite forward if its prerequisites allow it.
    ///
    /// Returns the composite's current state. Safe to call any number of
    /// times, from any number of tasks.
    pub async fn advance(&self, id: JobId) -> Result<Job, CoreError> {
        let job = self.resolver.resolve(id).await?;
        if job.status != JobStatus::Pending || !job.kind.is_composite() {
            return Ok(job);
        }

        let mut all_completed = true;
        for prerequisite in job.inputs.prerequisites() {
            let message = match self.resolver.resolve(prerequisite.job_id).await {
                Ok(prereq) => match prereq.status {
                    JobStatus::Completed => continue,
                    JobStatus::Pending | JobStatus::Running => {
                        all_completed = false;
                        continue;
                    }
                    JobStatus::Failed => format!(
                        "{} prerequisite {} failed: {}",
                        prerequisite.role,
                        prerequisite.job_id,
                        prereq.error_message.as_deref().unwrap_or("unknown error"),
                    ),
                },
                Err(CoreError::NotFound { .. }) => format!(
                    "{} prerequisite {} does not exist",
                    prerequisite.role, prerequisite.job_id
                ),
                Err(e) => return Err(e),
            };

            tracing::info!(
                job_id = %id,
                prerequisite_id = %prerequisite.job_id,
                role = %prerequisite.role,
                "Prerequisite failed, failing composite",
            );
            return self.fail_composite(id, message).await;
        }

        if !all_completed {
            return Ok(job);
        }

        tracing::info!(job_id = %id, kind = %job.kind, "Prerequisites completed, dispatching composite");
        self.dispatcher.dispatch(&job).await?;
        self.resolver.resolve(id).await
    }

    /// Advance every pending composite that references `prerequisite_id`.
    pub async fn advance_dependents(&self, prerequisite_id: JobId) -> Result<usize, CoreError> {
        let query = JobListQuery {
            depends_on: Some(prerequisite_id),
            status: Some(JobStatus::Pending),
            ..Default::default()
        };
        let dependents = self.collect_ids(query).await?;
        for id in &dependents {
            if let Err(e) = self.advance(*id).await {
                tracing::error!(job_id = %id, error = %e, "Failed to advance composite");
            }
        }
        Ok(dependents.len())
    }

    /// Advance every pending composite.
    pub async fn sweep(&self) -> Result<usize, CoreError> {
        let mut pending = Vec::new();
        for kind in [JobKind::EconomicImpact, JobKind::HouseholdImpact] {
            let query = JobListQuery {
                kind: Some(kind),
                status: Some(JobStatus::Pending),
                ..Default::default()
            };
            pending.extend(self.collect_ids(query).await?);
        }
        for id in &pending {
            if let Err(e) = self.advance(*id).await {
                tracing::error!(job_id = %id, error = %e, "Failed to advance composite");
            }
        }
        Ok(pending.len())
    }

    /// Run the sequencing loop until `cancel` is triggered.
    pub async fn run(
        self: Arc<Self>,
        mut receiver: broadcast::Receiver<PlatformEvent>,
        cancel: CancellationToken,
    ) {
        let mut ticker = tokio::time::interval(self.sweep_interval);
        tracing::info!(
            sweep_interval_ms = self.sweep_interval.as_millis() as u64,
            "Dependency sequencer started",
        );

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    tracing::info!("Dependency sequencer shutting down");
                    break;
                }
                received = receiver.recv() => match received {
                    Ok(event) => self.handle_event(&event).await,
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        tracing::warn!(skipped = n, "Dependency sequencer lagged, sweeping");
                        self.run_sweep().await;
                    }
                    Err(broadcast::error::RecvError::Closed) => {
                        tracing::info!("Event bus closed, dependency sequencer shutting down");
                        break;
                    }
                },
                _ = ticker.tick() => self.run_sweep().await,
            }
        }
    }

    /// Subscribe to `events` and run the loop on a background task.
    pub fn spawn(
        self: Arc<Self>,
        events: &EventBus,
        cancel: CancellationToken,
    ) -> tokio::task::JoinHandle<()> {
        let receiver = events.subscribe();
        tokio::spawn(self.run(receiver, cancel))
    }

    // ---- private helpers ----

    async fn handle_event(&self, event: &PlatformEvent) {
        let (Some(id), Some(status)) = (event.job_id(), event.job_status()) else {
            return;
        };
        if !status.is_terminal() {
            return;
        }
        // Composites are never prerequisites of other jobs.
        if event.job_kind().is_some_and(JobKind::is_composite) {
            return;
        }
        if let Err(e) = self.advance_dependents(id).await {
            tracing::error!(
                job_id = %id,
                event_type = %event.event_type,
                error = %e,
                "Failed to advance dependents",
            );
        }
    }

    async fn run_sweep(&self) {
        match self.sweep().await {
            Ok(0) => tracing::trace!("Sequencer sweep: no pending composites"),
            Ok(n) => tracing::debug!(pending = n, "Sequencer sweep advanced composites"),
            Err(e) => tracing::error!(error = %e, "Sequencer sweep failed"),
        }
    }

    async fn fail_composite(&self, id: JobId, message: String) -> Result<Job, CoreError> {
        match self.lifecycle.transition(id, Transition::failed(message)).await {
            Ok(outcome) => Ok(outcome.job),
            // Raced with another advance; report whatever won.
            Err(CoreError::InvalidTransition { .. }) => self.resolver.resolve(id).await,
            Err(e) => Err(e),
        }
    }

    /// Page through `query` and collect matching ids before any of them are
    /// modified, so advancing does not shift later pages.
    async fn collect_ids(&self, mut query: JobListQuery) -> Result<Vec<JobId>, CoreError> {
        query.limit = Some(MAX_LIMIT);
        let mut offset = 0;
        let mut ids = Vec::new();
        loop {
            query.offset = Some(offset);
            let page = self.lifecycle.list(&query).await?;
            let len = page.len() as i64;
            ids.extend(page.into_iter().map(|job| job.id));
            if len < MAX_LIMIT {
                return Ok(ids);
            }
            offset += len;
        }
    }
}

/// A reused job must have been created from the same inputs as the request
/// that derived its id.
fn ensure_same_inputs(job: &Job, inputs: &JobInputs) -> Result<(), CoreError> {
    if job.inputs == *inputs {
        return Ok(());
    }
    tracing::warn!(job_id = %job.id, "Derived id collides with a job of different inputs");
    Err(CoreError::Validation(format!(
        "Job {} already exists with different inputs",
        job.id
    )))
}
