//! Job records, their inputs, and the forward-only status state machine.
//!
//! A job moves `pending -> running -> completed | failed`, with one shortcut:
//! `pending -> failed` for jobs that are doomed before compute starts (a
//! composite whose prerequisite failed). Nothing ever moves backwards and
//! nothing leaves a terminal state.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;
use validator::Validate;

use crate::error::CoreError;
use crate::types::{JobId, Timestamp};

/// Error message recorded when a failure callback carries no message.
pub const UNKNOWN_FAILURE_MESSAGE: &str = "Job failed without an error message";

// ---------------------------------------------------------------------------
// Status
// ---------------------------------------------------------------------------

/// Job execution status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Pending,
    Running,
    Completed,
    Failed,
}

impl JobStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            JobStatus::Pending => "pending",
            JobStatus::Running => "running",
            JobStatus::Completed => "completed",
            JobStatus::Failed => "failed",
        }
    }

    /// `completed` and `failed` accept no further transitions.
    pub fn is_terminal(self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Failed)
    }

    /// Whether the state machine allows moving from `self` to `next`.
    pub fn can_transition_to(self, next: JobStatus) -> bool {
        matches!(
            (self, next),
            (JobStatus::Pending, JobStatus::Running)
                | (JobStatus::Pending, JobStatus::Failed)
                | (JobStatus::Running, JobStatus::Completed)
                | (JobStatus::Running, JobStatus::Failed)
        )
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for JobStatus {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(JobStatus::Pending),
            "running" => Ok(JobStatus::Running),
            "completed" => Ok(JobStatus::Completed),
            "failed" => Ok(JobStatus::Failed),
            other => Err(CoreError::Validation(format!("Unknown job status '{other}'"))),
        }
    }
}

// ---------------------------------------------------------------------------
// Kind and country model
// ---------------------------------------------------------------------------

/// What a job computes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobKind {
    /// Population simulation over a dataset. Id is derived from its inputs.
    Simulation,
    /// Single-household calculation. Id is random.
    Household,
    /// Baseline vs reform simulation comparison (a report).
    EconomicImpact,
    /// Baseline vs reform household comparison.
    HouseholdImpact,
}

impl JobKind {
    pub fn as_str(self) -> &'static str {
        match self {
            JobKind::Simulation => "simulation",
            JobKind::Household => "household",
            JobKind::EconomicImpact => "economic_impact",
            JobKind::HouseholdImpact => "household_impact",
        }
    }

    /// Composite jobs wait on prerequisite jobs before they can be dispatched.
    pub fn is_composite(self) -> bool {
        matches!(self, JobKind::EconomicImpact | JobKind::HouseholdImpact)
    }
}

impl fmt::Display for JobKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for JobKind {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "simulation" => Ok(JobKind::Simulation),
            "household" => Ok(JobKind::Household),
            "economic_impact" => Ok(JobKind::EconomicImpact),
            "household_impact" => Ok(JobKind::HouseholdImpact),
            other => Err(CoreError::Validation(format!("Unknown job kind '{other}'"))),
        }
    }
}

/// Country tax-benefit model a job runs against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TaxBenefitModel {
    #[serde(rename = "policyengine_uk")]
    PolicyEngineUk,
    #[serde(rename = "policyengine_us")]
    PolicyEngineUs,
}

impl TaxBenefitModel {
    pub fn as_str(self) -> &'static str {
        match self {
            TaxBenefitModel::PolicyEngineUk => "policyengine_uk",
            TaxBenefitModel::PolicyEngineUs => "policyengine_us",
        }
    }

    /// Short country code used in compute function names.
    pub fn country(self) -> &'static str {
        match self {
            TaxBenefitModel::PolicyEngineUk => "uk",
            TaxBenefitModel::PolicyEngineUs => "us",
        }
    }
}

impl fmt::Display for TaxBenefitModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TaxBenefitModel {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "policyengine_uk" => Ok(TaxBenefitModel::PolicyEngineUk),
            "policyengine_us" => Ok(TaxBenefitModel::PolicyEngineUs),
            other => Err(CoreError::Validation(format!(
                "Unknown tax-benefit model '{other}'"
            ))),
        }
    }
}

// ---------------------------------------------------------------------------
// Inputs
// ---------------------------------------------------------------------------

/// Semantic inputs of a population simulation.
///
/// `tax_benefit_model` is implied by `model_version_id` and is carried only
/// to route compute; it does not take part in identity derivation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulationInputs {
    pub tax_benefit_model: TaxBenefitModel,
    pub dataset_id: Uuid,
    pub model_version_id: Uuid,
    pub policy_id: Option<Uuid>,
    pub dynamic_id: Option<Uuid>,
}

/// Raw household calculation request. Variables use flat values; the year
/// is given separately.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
pub struct HouseholdInputs {
    pub tax_benefit_model: TaxBenefitModel,
    #[validate(length(min = 1, message = "at least one person is required"))]
    pub people: Vec<Map<String, Value>>,
    #[serde(default)]
    pub benunit: Map<String, Value>,
    #[serde(default)]
    pub marital_unit: Map<String, Value>,
    #[serde(default)]
    pub family: Map<String, Value>,
    #[serde(default)]
    pub spm_unit: Map<String, Value>,
    #[serde(default)]
    pub tax_unit: Map<String, Value>,
    #[serde(default)]
    pub household: Map<String, Value>,
    #[validate(range(min = 2000, max = 2100))]
    #[serde(default)]
    pub year: Option<i32>,
    #[serde(default)]
    pub policy_id: Option<Uuid>,
    #[serde(default)]
    pub dynamic_id: Option<Uuid>,
}

/// Inputs of a composite job: references to its prerequisites.
///
/// Only the two prerequisite ids key the composite's derived id.
/// `tax_benefit_model` and `label` must therefore be functions of the
/// prerequisites; a composite reused with a different model or label is
/// rejected when it is created.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompositeInputs {
    pub tax_benefit_model: TaxBenefitModel,
    pub label: String,
    pub baseline_job_id: JobId,
    pub reform_job_id: JobId,
}

/// Which side of a comparison a prerequisite provides.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PrerequisiteRole {
    Baseline,
    Reform,
}

impl fmt::Display for PrerequisiteRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PrerequisiteRole::Baseline => f.write_str("baseline"),
            PrerequisiteRole::Reform => f.write_str("reform"),
        }
    }
}

/// A prerequisite reference of a composite job.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Prerequisite {
    pub role: PrerequisiteRole,
    pub job_id: JobId,
}

/// Immutable record of exactly what was requested.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum JobInputs {
    Simulation(SimulationInputs),
    Household(HouseholdInputs),
    EconomicImpact(CompositeInputs),
    HouseholdImpact(CompositeInputs),
}

impl JobInputs {
    pub fn kind(&self) -> JobKind {
        match self {
            JobInputs::Simulation(_) => JobKind::Simulation,
            JobInputs::Household(_) => JobKind::Household,
            JobInputs::EconomicImpact(_) => JobKind::EconomicImpact,
            JobInputs::HouseholdImpact(_) => JobKind::HouseholdImpact,
        }
    }

    pub fn tax_benefit_model(&self) -> TaxBenefitModel {
        match self {
            JobInputs::Simulation(s) => s.tax_benefit_model,
            JobInputs::Household(h) => h.tax_benefit_model,
            JobInputs::EconomicImpact(c) | JobInputs::HouseholdImpact(c) => c.tax_benefit_model,
        }
    }

    /// Prerequisites in canonical order: baseline first, then reform.
    /// Empty for non-composite jobs.
    pub fn prerequisites(&self) -> Vec<Prerequisite> {
        match self {
            JobInputs::EconomicImpact(c) | JobInputs::HouseholdImpact(c) => vec![
                Prerequisite {
                    role: PrerequisiteRole::Baseline,
                    job_id: c.baseline_job_id,
                },
                Prerequisite {
                    role: PrerequisiteRole::Reform,
                    job_id: c.reform_job_id,
                },
            ],
            JobInputs::Simulation(_) | JobInputs::Household(_) => Vec::new(),
        }
    }

    /// Prerequisite ids in canonical order.
    pub fn prerequisite_ids(&self) -> Vec<JobId> {
        self.prerequisites().into_iter().map(|p| p.job_id).collect()
    }
}

// ---------------------------------------------------------------------------
// Transitions
// ---------------------------------------------------------------------------

/// A requested status change, carrying exactly the payload its target needs.
#[derive(Debug, Clone, PartialEq)]
pub enum Transition {
    Running,
    Completed { result: Value },
    Failed { error_message: String },
}

impl Transition {
    pub fn completed(result: Value) -> Self {
        Transition::Completed { result }
    }

    /// A failure transition. Blank messages are replaced so that a failed job
    /// always reports a non-empty `error_message`.
    pub fn failed(error_message: impl Into<String>) -> Self {
        let error_message = error_message.into();
        let error_message = if error_message.trim().is_empty() {
            UNKNOWN_FAILURE_MESSAGE.to_string()
        } else {
            error_message
        };
        Transition::Failed { error_message }
    }

    pub fn target(&self) -> JobStatus {
        match self {
            Transition::Running => JobStatus::Running,
            Transition::Completed { .. } => JobStatus::Completed,
            Transition::Failed { .. } => JobStatus::Failed,
        }
    }
}

/// Outcome of checking a transition against a job's current state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransitionCheck {
    /// The transition is legal and changes the job.
    Apply,
    /// The job is already in the target state with the same payload; a
    /// retried transition is a no-op.
    AlreadyApplied,
}

// ---------------------------------------------------------------------------
// Job
// ---------------------------------------------------------------------------

/// A unit of asynchronously computed work.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Job {
    pub id: JobId,
    pub kind: JobKind,
    pub status: JobStatus,
    pub inputs: JobInputs,
    pub result: Option<Value>,
    pub error_message: Option<String>,
    pub created_at: Timestamp,
    pub started_at: Option<Timestamp>,
    pub completed_at: Option<Timestamp>,
}

impl Job {
    /// A freshly created job: `pending`, no payload, no timestamps but creation.
    pub fn new_pending(id: JobId, inputs: JobInputs, created_at: Timestamp) -> Self {
        Self {
            id,
            kind: inputs.kind(),
            status: JobStatus::Pending,
            inputs,
            result: None,
            error_message: None,
            created_at,
            started_at: None,
            completed_at: None,
        }
    }

    /// Decide whether `transition` may be applied to this job.
    pub fn check_transition(&self, transition: &Transition) -> Result<TransitionCheck, CoreError> {
        let target = transition.target();

        if self.status == target {
            let same_payload = match transition {
                Transition::Running => true,
                Transition::Completed { result } => self.result.as_ref() == Some(result),
                Transition::Failed { error_message } => {
                    self.error_message.as_deref() == Some(error_message.as_str())
                }
            };
            if same_payload {
                return Ok(TransitionCheck::AlreadyApplied);
            }
        } else if self.status.can_transition_to(target) {
            return Ok(TransitionCheck::Apply);
        }

        Err(CoreError::InvalidTransition {
            id: self.id,
            from: self.status,
            to: target,
        })
    }

    /// Apply a transition, enforcing the state machine.
    ///
    /// Returns `true` when the job changed, `false` for an idempotent retry.
    pub fn apply(&mut self, transition: Transition, at: Timestamp) -> Result<bool, CoreError> {
        if self.check_transition(&transition)? == TransitionCheck::AlreadyApplied {
            return Ok(false);
        }

        self.status = transition.target();
        match transition {
            Transition::Running => {
                self.started_at = Some(at);
            }
            Transition::Completed { result } => {
                self.result = Some(result);
                self.completed_at = Some(at);
            }
            Transition::Failed { error_message } => {
                self.error_message = Some(error_message);
                self.completed_at = Some(at);
            }
        }
        Ok(true)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
