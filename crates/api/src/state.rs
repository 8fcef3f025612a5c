use std::sync::Arc;

use microsim_pipeline::JobService;

use crate::config::ServerConfig;

/// Shared application state available to all Axum handlers via `State<AppState>`.
///
/// Cheaply cloneable; everything inside is behind an `Arc`.
#[derive(Clone)]
pub struct AppState {
    /// Job orchestration: creation, callbacks, polling.
    pub service: Arc<JobService>,
    pub config: Arc<ServerConfig>,
}
