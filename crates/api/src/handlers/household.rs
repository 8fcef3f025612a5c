//! Handlers for single-household calculations and their policy impact.

use axum::extract::{Path, State};
use axum::response::IntoResponse;
use axum::Json;
use microsim_core::job::{HouseholdInputs, JobKind};
use microsim_core::types::JobId;

use crate::error::AppResult;
use crate::handlers::create_status;
use crate::response::{CompositeJob, CreatedJob, DataResponse};
use crate::state::AppState;

/// POST /api/v1/household/calculate
///
/// Always creates a new job.
pub async fn calculate(
    State(state): State<AppState>,
    Json(input): Json<HouseholdInputs>,
) -> AppResult<impl IntoResponse> {
    let created = state.service.create_household(input).await?;
    tracing::info!(job_id = %created.job.id, "Household calculation requested");
    Ok((
        create_status(created.created),
        Json(DataResponse {
            data: CreatedJob::from(created),
        }),
    ))
}

/// GET /api/v1/household/calculate/{id}
pub async fn get_calculation(
    State(state): State<AppState>,
    Path(id): Path<JobId>,
) -> AppResult<impl IntoResponse> {
    let job = state.service.resolve_kind(id, JobKind::Household).await?;
    Ok(Json(DataResponse { data: job }))
}

/// POST /api/v1/household/impact
///
/// Calculates the household with and without `policy_id` and compares the
/// two once both are done.
pub async fn create_impact(
    State(state): State<AppState>,
    Json(input): Json<HouseholdInputs>,
) -> AppResult<impl IntoResponse> {
    let view = state.service.create_household_impact(input).await?;
    tracing::info!(
        job_id = %view.job.id,
        baseline_id = %view.baseline.id,
        reform_id = %view.reform.id,
        "Household impact requested",
    );
    Ok((
        create_status(view.created),
        Json(DataResponse {
            data: CompositeJob::created(view),
        }),
    ))
}

/// GET /api/v1/household/impact/{id}
pub async fn get_impact(
    State(state): State<AppState>,
    Path(id): Path<JobId>,
) -> AppResult<impl IntoResponse> {
    let view = state
        .service
        .resolve_composite(id, JobKind::HouseholdImpact)
        .await?;
    Ok(Json(DataResponse {
        data: CompositeJob::polled(view),
    }))
}
