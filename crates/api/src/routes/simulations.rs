use axum::routing::get;
use axum::Router;

use crate::handlers::simulations;
use crate::state::AppState;

/// Routes mounted at `/simulations`.
///
/// ```text
/// GET    /        -> list_simulations
/// POST   /        -> create_simulation
/// GET    /{id}    -> get_simulation
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route(
            "/",
            get(simulations::list_simulations).post(simulations::create_simulation),
        )
        .route("/{id}", get(simulations::get_simulation))
}
