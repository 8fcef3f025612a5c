//! Content-addressed job identifiers.
//!
//! Simulation and composite ids are UUIDv5 values over a canonical string of
//! their semantic inputs, so identical requests map to the same id on every
//! process and the id itself is the deduplication key. Derived ids are
//! ordinary UUIDs and cannot be told apart from random ones.
//!
//! Canonical key formats (field order is part of the format; changing it
//! invalidates every previously cached job):
//!
//! | Kind              | Namespace                               | Key                                                   |
//! |-------------------|-----------------------------------------|-------------------------------------------------------|
//! | simulation        | `a1b2c3d4-e5f6-7890-abcd-ef1234567890`  | `{dataset_id}:{model_version_id}:{policy_id}:{dynamic_id}` |
//! | economic impact   | `b2c3d4e5-f6a7-8901-bcde-f12345678901`  | `{baseline_id}:{reform_id}`                           |
//! | household impact  | `c3d4e5f6-a7b8-9012-cdef-123456789012`  | `{baseline_id}:{reform_id}`                           |
//!
//! Absent optional ids are written as the literal [`ABSENT`].

use uuid::Uuid;

use crate::job::{CompositeInputs, JobInputs, SimulationInputs};
use crate::types::JobId;

pub const SIMULATION_NAMESPACE: Uuid = Uuid::from_u128(0xa1b2c3d4_e5f6_7890_abcd_ef1234567890);
pub const ECONOMIC_IMPACT_NAMESPACE: Uuid =
    Uuid::from_u128(0xb2c3d4e5_f6a7_8901_bcde_f12345678901);
pub const HOUSEHOLD_IMPACT_NAMESPACE: Uuid =
    Uuid::from_u128(0xc3d4e5f6_a7b8_9012_cdef_123456789012);

/// Sentinel for an absent optional id. Never the empty string.
pub const ABSENT: &str = "None";

fn canonical(id: Option<Uuid>) -> String {
    match id {
        Some(id) => id.hyphenated().to_string(),
        None => ABSENT.to_string(),
    }
}

/// Id of a simulation, derived from dataset, model version, policy and dynamic.
pub fn simulation_id(inputs: &SimulationInputs) -> JobId {
    let key = format!(
        "{}:{}:{}:{}",
        inputs.dataset_id.hyphenated(),
        inputs.model_version_id.hyphenated(),
        canonical(inputs.policy_id),
        canonical(inputs.dynamic_id),
    );
    Uuid::new_v5(&SIMULATION_NAMESPACE, key.as_bytes())
}

fn composite_id(namespace: &Uuid, inputs: &CompositeInputs) -> JobId {
    let key = format!(
        "{}:{}",
        inputs.baseline_job_id.hyphenated(),
        inputs.reform_job_id.hyphenated(),
    );
    Uuid::new_v5(namespace, key.as_bytes())
}

/// Derive the id for `inputs`, or `None` when the job kind has no natural
/// deduplication key (household calculations get a fresh random id).
pub fn derive_id(inputs: &JobInputs) -> Option<JobId> {
    match inputs {
        JobInputs::Simulation(s) => Some(simulation_id(s)),
        JobInputs::EconomicImpact(c) => Some(composite_id(&ECONOMIC_IMPACT_NAMESPACE, c)),
        JobInputs::HouseholdImpact(c) => Some(composite_id(&HOUSEHOLD_IMPACT_NAMESPACE, c)),
        JobInputs::Household(_) => None,
    }
}
