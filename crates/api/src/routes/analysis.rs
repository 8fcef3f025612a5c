use axum::routing::{get, post};
use axum::Router;

use crate::handlers::analysis;
use crate::state::AppState;

/// Routes mounted at `/analysis`.
///
/// ```text
/// POST   /economic-impact         -> create_economic_impact
/// GET    /economic-impact/{id}    -> get_economic_impact
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/economic-impact", post(analysis::create_economic_impact))
        .route("/economic-impact/{id}", get(analysis::get_economic_impact))
}
