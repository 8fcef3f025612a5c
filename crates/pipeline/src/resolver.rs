use std::sync::Arc;

use microsim_core::error::CoreError;
use microsim_core::job::Job;
use microsim_core::types::JobId;
use microsim_db::store::JobStore;

/// Read-only status lookup shared by HTTP polling and the sequencer.
#[derive(Clone)]
pub struct StatusResolver {
    store: Arc<dyn JobStore>,
}

impl StatusResolver {
    pub fn new(store: Arc<dyn JobStore>) -> Self {
        Self { store }
    }

    /// Current state of `id`. A `failed` job resolves normally, with its
    /// `error_message` set; only an unknown id is an error.
    pub async fn resolve(&self, id: JobId) -> Result<Job, CoreError> {
        self.store.get(id).await
    }
}
