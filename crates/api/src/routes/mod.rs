pub mod analysis;
pub mod callbacks;
pub mod health;
pub mod household;
pub mod jobs;
pub mod simulations;

use axum::Router;

use crate::state::AppState;

/// Build the `/api/v1` route tree.
///
/// ```text
/// /simulations                      create, list
/// /simulations/{id}                 poll
/// /analysis/economic-impact         create
/// /analysis/economic-impact/{id}    poll
/// /household/calculate              create
/// /household/calculate/{id}         poll
/// /household/impact                 create
/// /household/impact/{id}            poll
/// /jobs                             list (any kind)
/// /jobs/{id}                        poll (any kind)
/// /callbacks/jobs/{id}              compute completion callback
/// ```
pub fn api_routes() -> Router<AppState> {
    Router::new()
        .nest("/simulations", simulations::router())
        .nest("/analysis", analysis::router())
        .nest("/household", household::router())
        .nest("/jobs", jobs::router())
        .nest("/callbacks", callbacks::router())
}
