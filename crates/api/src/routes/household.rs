use axum::routing::{get, post};
use axum::Router;

use crate::handlers::household;
use crate::state::AppState;

/// Routes mounted at `/household`.
///
/// ```text
/// POST   /calculate         -> calculate
/// GET    /calculate/{id}    -> get_calculation
/// POST   /impact            -> create_impact
/// GET    /impact/{id}       -> get_impact
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/calculate", post(household::calculate))
        .route("/calculate/{id}", get(household::get_calculation))
        .route("/impact", post(household::create_impact))
        .route("/impact/{id}", get(household::get_impact))
}
