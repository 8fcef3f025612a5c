//! In-process compute for household impact composites.
//!
//! The comparison of two finished household calculations is a small JSON
//! diff, so it runs here rather than on the remote compute surface. The
//! backend completes the job itself, the same way the remote collaborator
//! would report back.

use async_trait::async_trait;
use microsim_compute::{ComputeBackend, ComputeError, ComputeRequest};
use microsim_core::error::CoreError;
use microsim_core::impact::household_impact;
use microsim_core::job::{CompositeInputs, JobInputs, JobStatus, Transition};
use microsim_core::types::JobId;
use serde_json::{json, Value};

use crate::lifecycle::JobLifecycle;

pub struct HouseholdImpactBackend {
    lifecycle: JobLifecycle,
}

impl HouseholdImpactBackend {
    pub fn new(lifecycle: JobLifecycle) -> Self {
        Self { lifecycle }
    }

    async fn completed_result(&self, id: JobId) -> Result<Value, String> {
        let job = self.lifecycle.get(id).await.map_err(|e| e.to_string())?;
        match (job.status, job.result) {
            (JobStatus::Completed, Some(result)) => Ok(result),
            (status, _) => Err(format!("Household job {id} is {status}, not completed")),
        }
    }

    /// Compute the composite result, or a failure message.
    async fn compute(&self, inputs: &CompositeInputs) -> Result<Value, String> {
        let baseline = self.completed_result(inputs.baseline_job_id).await?;
        let reform = self.completed_result(inputs.reform_job_id).await?;
        let impact = household_impact(&baseline, &reform);
        Ok(json!({
            "baseline": baseline,
            "reform": reform,
            "impact": impact,
        }))
    }
}

#[async_trait]
impl ComputeBackend for HouseholdImpactBackend {
    async fn spawn(&self, request: &ComputeRequest) -> Result<(), ComputeError> {
        let JobInputs::HouseholdImpact(inputs) = &request.inputs else {
            return Err(ComputeError::Unavailable(format!(
                "{} jobs are not computed in-process",
                request.inputs.kind()
            )));
        };

        let transition = match self.compute(inputs).await {
            Ok(result) => Transition::completed(result),
            Err(message) => Transition::failed(message),
        };

        match self.lifecycle.transition(request.job_id, transition).await {
            Ok(_) => Ok(()),
            // Someone else already settled the job.
            Err(CoreError::InvalidTransition { .. }) => Ok(()),
            Err(e) => Err(ComputeError::Unavailable(e.to_string())),
        }
    }
}
