//! Shared fixtures for orchestration tests.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use microsim_compute::{ComputeBackend, ComputeError, ComputeRequest};
use microsim_core::job::{HouseholdInputs, SimulationInputs, TaxBenefitModel};
use microsim_db::memory::MemoryJobStore;
use microsim_events::EventBus;
use microsim_pipeline::service::{JobService, ServiceSettings};
use serde_json::{json, Map, Value};
use tokio::sync::Mutex;
use uuid::Uuid;

pub const DATASET: Uuid = Uuid::from_u128(0xd1);
pub const POLICY: Uuid = Uuid::from_u128(0x91);
pub const UK_MODEL_VERSION: Uuid = Uuid::from_u128(0x0a);

/// Compute backend that records every spawn instead of running anything.
#[derive(Default)]
pub struct RecordingBackend {
    spawned: Mutex<Vec<ComputeRequest>>,
    fail: bool,
}

impl RecordingBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// A backend whose every spawn fails as if the surface were unreachable.
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    pub async fn spawned(&self) -> Vec<ComputeRequest> {
        self.spawned.lock().await.clone()
    }

    pub async fn spawn_count(&self, job_id: Uuid) -> usize {
        self.spawned
            .lock()
            .await
            .iter()
            .filter(|r| r.job_id == job_id)
            .count()
    }
}

#[async_trait]
impl ComputeBackend for RecordingBackend {
    async fn spawn(&self, request: &ComputeRequest) -> Result<(), ComputeError> {
        self.spawned.lock().await.push(request.clone());
        if self.fail {
            return Err(ComputeError::ApiError {
                status: 503,
                body: "compute surface unavailable".into(),
            });
        }
        Ok(())
    }
}

pub struct Harness {
    pub service: Arc<JobService>,
    pub backend: Arc<RecordingBackend>,
    pub store: Arc<MemoryJobStore>,
}

pub fn harness() -> Harness {
    harness_with(RecordingBackend::new())
}

pub fn harness_with(backend: RecordingBackend) -> Harness {
    let store = Arc::new(MemoryJobStore::new());
    let backend = Arc::new(backend);
    let settings = ServiceSettings {
        model_versions: HashMap::from([(TaxBenefitModel::PolicyEngineUk, UK_MODEL_VERSION)]),
        ..Default::default()
    };
    let service = JobService::new(
        store.clone(),
        Arc::new(EventBus::default()),
        backend.clone(),
        settings,
    );
    Harness {
        service: Arc::new(service),
        backend,
        store,
    }
}

pub fn simulation(policy_id: Option<Uuid>) -> SimulationInputs {
    SimulationInputs {
        tax_benefit_model: TaxBenefitModel::PolicyEngineUk,
        dataset_id: DATASET,
        model_version_id: UK_MODEL_VERSION,
        policy_id,
        dynamic_id: None,
    }
}

pub fn household(policy_id: Option<Uuid>) -> HouseholdInputs {
    let mut person = Map::new();
    person.insert("age".into(), json!(30));
    person.insert("employment_income".into(), json!(30000));
    HouseholdInputs {
        tax_benefit_model: TaxBenefitModel::PolicyEngineUk,
        people: vec![person],
        benunit: Map::new(),
        marital_unit: Map::new(),
        family: Map::new(),
        spm_unit: Map::new(),
        tax_unit: Map::new(),
        household: Map::new(),
        year: Some(2026),
        policy_id,
        dynamic_id: None,
    }
}

pub fn household_result(net_income: f64, income_tax: i64) -> Value {
    json!({
        "household": {"household_net_income": net_income},
        "person": [{"income_tax": income_tax, "age": 30}],
    })
}
