//! Handlers for the `/simulations` resource.

use axum::extract::{Path, Query, State};
use axum::response::IntoResponse;
use axum::Json;
use microsim_core::job::{JobKind, SimulationInputs};
use microsim_core::types::JobId;
use microsim_db::models::job::JobListQuery;

use crate::error::AppResult;
use crate::handlers::create_status;
use crate::response::{CreatedJob, DataResponse};
use crate::state::AppState;

/// POST /api/v1/simulations
///
/// Create a population simulation, or return the existing one for identical
/// inputs. Returns 201 when a job was created, 200 when it was reused.
pub async fn create_simulation(
    State(state): State<AppState>,
    Json(input): Json<SimulationInputs>,
) -> AppResult<impl IntoResponse> {
    let created = state.service.create_simulation(input).await?;

    tracing::info!(
        job_id = %created.job.id,
        created = created.created,
        status = %created.job.status,
        "Simulation requested",
    );

    Ok((
        create_status(created.created),
        Json(DataResponse {
            data: CreatedJob::from(created),
        }),
    ))
}

/// GET /api/v1/simulations
///
/// Supports optional `status`, `limit` and `offset` query parameters.
pub async fn list_simulations(
    State(state): State<AppState>,
    Query(mut params): Query<JobListQuery>,
) -> AppResult<impl IntoResponse> {
    params.kind = Some(JobKind::Simulation);
    let jobs = state.service.list(&params).await?;
    Ok(Json(DataResponse { data: jobs }))
}

/// GET /api/v1/simulations/{id}
pub async fn get_simulation(
    State(state): State<AppState>,
    Path(id): Path<JobId>,
) -> AppResult<impl IntoResponse> {
    let job = state.service.resolve_kind(id, JobKind::Simulation).await?;
    Ok(Json(DataResponse { data: job }))
}
