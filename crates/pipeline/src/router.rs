use std::sync::Arc;

use async_trait::async_trait;
use microsim_compute::{ComputeBackend, ComputeError, ComputeRequest};
use microsim_core::job::JobKind;

/// Sends household impact jobs to the in-process backend and everything
/// else to the remote compute surface.
pub struct ComputeRouter {
    remote: Arc<dyn ComputeBackend>,
    inline: Arc<dyn ComputeBackend>,
}

impl ComputeRouter {
    pub fn new(remote: Arc<dyn ComputeBackend>, inline: Arc<dyn ComputeBackend>) -> Self {
        Self { remote, inline }
    }
}

#[async_trait]
impl ComputeBackend for ComputeRouter {
    async fn spawn(&self, request: &ComputeRequest) -> Result<(), ComputeError> {
        match request.inputs.kind() {
            JobKind::HouseholdImpact => self.inline.spawn(request).await,
            JobKind::Simulation | JobKind::Household | JobKind::EconomicImpact => {
                self.remote.spawn(request).await
            }
        }
    }
}
