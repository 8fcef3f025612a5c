use async_trait::async_trait;
use microsim_core::job::{Job, JobInputs, JobKind};
use microsim_core::types::JobId;
use serde::Serialize;

/// Errors from handing work to the compute collaborator.
///
/// Any of these means the job's compute never started.
#[derive(Debug, thiserror::Error)]
pub enum ComputeError {
    /// The HTTP request itself failed (network, DNS, TLS, timeout).
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// The compute surface returned a non-2xx status code.
    #[error("Compute API error ({status}): {body}")]
    ApiError {
        /// HTTP status code.
        status: u16,
        /// Raw response body for debugging.
        body: String,
    },

    /// The backend refused the job before contacting anything.
    #[error("Compute unavailable: {0}")]
    Unavailable(String),
}

/// A unit of work handed to the compute collaborator.
#[derive(Debug, Clone, Serialize)]
pub struct ComputeRequest {
    pub job_id: JobId,
    /// Remote function to invoke, e.g. `economy_comparison_uk`.
    #[serde(skip)]
    pub function: String,
    pub inputs: JobInputs,
}

impl ComputeRequest {
    pub fn for_job(job: &Job) -> Self {
        Self {
            job_id: job.id,
            function: function_name(&job.inputs),
            inputs: job.inputs.clone(),
        }
    }
}

/// Compute function for `inputs`: `<operation>_<country>`.
pub fn function_name(inputs: &JobInputs) -> String {
    let operation = match inputs.kind() {
        JobKind::Simulation => "simulation",
        JobKind::Household => "simulate_household",
        JobKind::EconomicImpact => "economy_comparison",
        JobKind::HouseholdImpact => "household_impact",
    };
    format!("{operation}_{}", inputs.tax_benefit_model().country())
}

/// Fire-and-forget invocation of the compute collaborator.
///
/// `spawn` returns once the work is accepted; the result arrives later as a
/// completion transition on the job store.
#[async_trait]
pub trait ComputeBackend: Send + Sync {
    async fn spawn(&self, request: &ComputeRequest) -> Result<(), ComputeError>;
}

#[cfg(test)]
mod tests {
    use microsim_core::job::{CompositeInputs, SimulationInputs, TaxBenefitModel};
    use uuid::Uuid;

    use super::*;

    #[test]
    fn function_names_combine_operation_and_country() {
        let sim = JobInputs::Simulation(SimulationInputs {
            tax_benefit_model: TaxBenefitModel::PolicyEngineUs,
            dataset_id: Uuid::new_v4(),
            model_version_id: Uuid::new_v4(),
            policy_id: None,
            dynamic_id: None,
        });
        assert_eq!(function_name(&sim), "simulation_us");

        let report = JobInputs::EconomicImpact(CompositeInputs {
            tax_benefit_model: TaxBenefitModel::PolicyEngineUk,
            label: "Economic impact: policyengine_uk".into(),
            baseline_job_id: Uuid::new_v4(),
            reform_job_id: Uuid::new_v4(),
        });
        assert_eq!(function_name(&report), "economy_comparison_uk");
    }

    #[test]
    fn request_body_omits_function_name() {
        let inputs = JobInputs::Simulation(SimulationInputs {
            tax_benefit_model: TaxBenefitModel::PolicyEngineUk,
            dataset_id: Uuid::new_v4(),
            model_version_id: Uuid::new_v4(),
            policy_id: None,
            dynamic_id: None,
        });
        let request = ComputeRequest {
            job_id: Uuid::new_v4(),
            function: function_name(&inputs),
            inputs,
        };
        let body = serde_json::to_value(&request).unwrap();
        assert!(body.get("function").is_none());
        assert_eq!(body["inputs"]["kind"], "simulation");
        assert_eq!(body["job_id"], request.job_id.to_string());
    }
}
