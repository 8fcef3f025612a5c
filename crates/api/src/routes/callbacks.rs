use axum::routing::post;
use axum::Router;

use crate::handlers::callbacks;
use crate::state::AppState;

/// Routes mounted at `/callbacks`.
///
/// ```text
/// POST   /jobs/{id}    -> job_callback
/// ```
pub fn router() -> Router<AppState> {
    Router::new().route("/jobs/{id}", post(callbacks::job_callback))
}
