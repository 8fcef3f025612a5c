//! Entry point for callers that create, complete and poll jobs.
//!
//! [`JobService`] wires the store, event bus and compute backend into the
//! dispatcher, resolver and sequencer, and exposes the request-level
//! operations the HTTP layer maps onto routes.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use microsim_compute::ComputeBackend;
use microsim_core::error::CoreError;
use microsim_core::job::{
    HouseholdInputs, Job, JobInputs, JobKind, JobStatus, SimulationInputs, TaxBenefitModel,
    Transition,
};
use microsim_core::types::{JobId, Timestamp};
use microsim_db::models::job::JobListQuery;
use microsim_db::store::{JobStore, TransitionOutcome};
use microsim_events::EventBus;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;
use validator::Validate;

use crate::dispatcher::ComputeDispatcher;
use crate::inline::HouseholdImpactBackend;
use crate::lifecycle::JobLifecycle;
use crate::resolver::StatusResolver;
use crate::router::ComputeRouter;
use crate::sequencer::{
    CompositeKind, CompositeOutcome, CompositeRequest, DependencySequencer, DEFAULT_SWEEP_INTERVAL,
};

// ---------------------------------------------------------------------------
// Requests
// ---------------------------------------------------------------------------

/// Population-level comparison of a policy against the baseline.
#[derive(Debug, Clone, Deserialize)]
pub struct EconomicImpactRequest {
    pub tax_benefit_model: TaxBenefitModel,
    pub dataset_id: Uuid,
    pub policy_id: Option<Uuid>,
    pub dynamic_id: Option<Uuid>,
}

/// What the compute collaborator reports when a job changes state.
#[derive(Debug, Clone, Deserialize)]
pub struct CompletionReport {
    pub status: JobStatus,
    #[serde(default)]
    pub result: Option<Value>,
    #[serde(default)]
    pub error_message: Option<String>,
}

impl CompletionReport {
    fn into_transition(self) -> Result<Transition, CoreError> {
        match self.status {
            JobStatus::Running => Ok(Transition::Running),
            JobStatus::Completed => self.result.map(Transition::completed).ok_or_else(|| {
                CoreError::Validation("A completed job must carry a result".into())
            }),
            JobStatus::Failed => Ok(Transition::failed(self.error_message.unwrap_or_default())),
            JobStatus::Pending => Err(CoreError::Validation(
                "Jobs cannot be moved back to pending".into(),
            )),
        }
    }
}

// ---------------------------------------------------------------------------
// Responses
// ---------------------------------------------------------------------------

/// A job plus whether this request created it.
#[derive(Debug, Clone)]
pub struct Created {
    pub job: Job,
    pub created: bool,
}

/// Status line for one prerequisite of a composite.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct JobSummary {
    pub id: JobId,
    pub status: JobStatus,
    pub error_message: Option<String>,
    pub completed_at: Option<Timestamp>,
}

impl From<&Job> for JobSummary {
    fn from(job: &Job) -> Self {
        Self {
            id: job.id,
            status: job.status,
            error_message: job.error_message.clone(),
            completed_at: job.completed_at,
        }
    }
}

/// A composite with its prerequisites.
#[derive(Debug, Clone)]
pub struct CompositeView {
    pub job: Job,
    pub created: bool,
    pub baseline: JobSummary,
    pub reform: JobSummary,
}

impl From<CompositeOutcome> for CompositeView {
    fn from(outcome: CompositeOutcome) -> Self {
        Self {
            baseline: JobSummary::from(&outcome.baseline),
            reform: JobSummary::from(&outcome.reform),
            job: outcome.job,
            created: outcome.created,
        }
    }
}

// ---------------------------------------------------------------------------
// Service
// ---------------------------------------------------------------------------

/// Tunables for [`JobService`].
#[derive(Debug, Clone)]
pub struct ServiceSettings {
    /// Current model version per country model, used by economic impact
    /// requests.
    pub model_versions: HashMap<TaxBenefitModel, Uuid>,
    pub sweep_interval: Duration,
}

impl Default for ServiceSettings {
    fn default() -> Self {
        Self {
            model_versions: HashMap::new(),
            sweep_interval: DEFAULT_SWEEP_INTERVAL,
        }
    }
}

pub struct JobService {
    lifecycle: JobLifecycle,
    resolver: StatusResolver,
    sequencer: Arc<DependencySequencer>,
    model_versions: HashMap<TaxBenefitModel, Uuid>,
}

impl JobService {
    /// Build the service. `remote` receives every job except household
    /// impacts, which are computed in-process.
    pub fn new(
        store: Arc<dyn JobStore>,
        events: Arc<EventBus>,
        remote: Arc<dyn ComputeBackend>,
        settings: ServiceSettings,
    ) -> Self {
        let lifecycle = JobLifecycle::new(Arc::clone(&store), events);
        let resolver = StatusResolver::new(store);
        let inline = Arc::new(HouseholdImpactBackend::new(lifecycle.clone()));
        let backend = Arc::new(ComputeRouter::new(remote, inline));
        let dispatcher = ComputeDispatcher::new(lifecycle.clone(), backend);
        let sequencer = Arc::new(
            DependencySequencer::new(lifecycle.clone(), dispatcher, resolver.clone())
                .with_sweep_interval(settings.sweep_interval),
        );
        Self {
            lifecycle,
            resolver,
            sequencer,
            model_versions: settings.model_versions,
        }
    }

    pub fn sequencer(&self) -> &Arc<DependencySequencer> {
        &self.sequencer
    }

    pub fn events(&self) -> &Arc<EventBus> {
        self.lifecycle.events()
    }

    /// A `model_version_id` configured as the current version of another
    /// model is rejected, since the version does not take part in routing.
    pub async fn create_simulation(&self, inputs: SimulationInputs) -> Result<Created, CoreError> {
        let other_model = self
            .model_versions
            .iter()
            .find(|(model, version)| {
                **version == inputs.model_version_id && **model != inputs.tax_benefit_model
            })
            .map(|(model, _)| *model);
        if let Some(other) = other_model {
            return Err(CoreError::Validation(format!(
                "Model version {} belongs to {other}, not {}",
                inputs.model_version_id, inputs.tax_benefit_model
            )));
        }
        self.create(JobInputs::Simulation(inputs)).await
    }

    /// Household calculations are never deduplicated: each request gets a
    /// fresh id.
    pub async fn create_household(&self, inputs: HouseholdInputs) -> Result<Created, CoreError> {
        inputs.validate()?;
        self.create(JobInputs::Household(inputs)).await
    }

    /// Compare `request.policy_id` against the baseline over a dataset,
    /// using the current version of the requested model.
    pub async fn create_economic_impact(
        &self,
        request: EconomicImpactRequest,
    ) -> Result<CompositeView, CoreError> {
        let model = request.tax_benefit_model;
        let model_version_id = self.model_version(model)?;
        let simulation = |policy_id| {
            JobInputs::Simulation(SimulationInputs {
                tax_benefit_model: model,
                dataset_id: request.dataset_id,
                model_version_id,
                policy_id,
                dynamic_id: request.dynamic_id,
            })
        };

        let label = match request.policy_id {
            Some(policy_id) => format!("Economic impact: {model} (policy {policy_id})"),
            None => format!("Economic impact: {model}"),
        };

        let composite = CompositeRequest {
            kind: CompositeKind::EconomicImpact,
            tax_benefit_model: model,
            label,
            baseline: simulation(None),
            reform: simulation(request.policy_id),
        };
        Ok(self.sequencer.create_composite(composite).await?.into())
    }

    /// Compare `household` under its `policy_id` against the same household
    /// without a policy.
    pub async fn create_household_impact(
        &self,
        household: HouseholdInputs,
    ) -> Result<CompositeView, CoreError> {
        household.validate()?;
        let model = household.tax_benefit_model;
        let label = match household.policy_id {
            Some(policy_id) => format!("Household impact: {model} (policy {policy_id})"),
            None => format!("Household impact: {model}"),
        };
        let baseline = HouseholdInputs {
            policy_id: None,
            ..household.clone()
        };

        let composite = CompositeRequest {
            kind: CompositeKind::HouseholdImpact,
            tax_benefit_model: model,
            label,
            baseline: JobInputs::Household(baseline),
            reform: JobInputs::Household(household),
        };
        Ok(self.sequencer.create_composite(composite).await?.into())
    }

    /// Apply a state change reported by the compute collaborator.
    ///
    /// Only jobs that were dispatched can be reported on. A `pending` job
    /// belongs to the dispatcher and the sequencer, so any report for one is
    /// an invalid transition.
    pub async fn record_completion(
        &self,
        id: JobId,
        report: CompletionReport,
    ) -> Result<TransitionOutcome, CoreError> {
        let transition = report.into_transition()?;
        let current = self.resolver.resolve(id).await?;
        if current.status == JobStatus::Pending {
            tracing::warn!(
                job_id = %id,
                to = %transition.target(),
                "Rejected report for an undispatched job",
            );
            return Err(CoreError::InvalidTransition {
                id,
                from: JobStatus::Pending,
                to: transition.target(),
            });
        }
        self.lifecycle.transition(id, transition).await
    }

    pub async fn resolve(&self, id: JobId) -> Result<Job, CoreError> {
        self.resolver.resolve(id).await
    }

    /// Resolve `id`, requiring it to be of `kind`.
    pub async fn resolve_kind(&self, id: JobId, kind: JobKind) -> Result<Job, CoreError> {
        let job = self.resolver.resolve(id).await?;
        if job.kind != kind {
            return Err(CoreError::job_not_found(id));
        }
        Ok(job)
    }

    /// Resolve a composite of `kind` together with its prerequisites.
    pub async fn resolve_composite(&self, id: JobId, kind: JobKind) -> Result<CompositeView, CoreError> {
        let job = self.resolve_kind(id, kind).await?;
        let (baseline_id, reform_id) = match &job.inputs {
            JobInputs::EconomicImpact(c) | JobInputs::HouseholdImpact(c) => {
                (c.baseline_job_id, c.reform_job_id)
            }
            JobInputs::Simulation(_) | JobInputs::Household(_) => {
                return Err(CoreError::job_not_found(id))
            }
        };
        let baseline = self.resolver.resolve(baseline_id).await?;
        let reform = self.resolver.resolve(reform_id).await?;
        Ok(CompositeView {
            job,
            created: false,
            baseline: JobSummary::from(&baseline),
            reform: JobSummary::from(&reform),
        })
    }

    pub async fn list(&self, query: &JobListQuery) -> Result<Vec<Job>, CoreError> {
        self.lifecycle.list(query).await
    }

    pub async fn is_healthy(&self) -> bool {
        self.lifecycle.store().is_healthy().await
    }

    // ---- private helpers ----

    async fn create(&self, inputs: JobInputs) -> Result<Created, CoreError> {
        let (job, created) = self.sequencer.create_and_dispatch(&inputs).await?;
        Ok(Created { job, created })
    }

    fn model_version(&self, model: TaxBenefitModel) -> Result<Uuid, CoreError> {
        self.model_versions.get(&model).copied().ok_or_else(|| {
            CoreError::Validation(format!("No model version is configured for {model}"))
        })
    }
}
