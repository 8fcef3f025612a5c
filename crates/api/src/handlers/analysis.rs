//! Handlers for economic impact analyses.
//!
//! An economic impact is a composite over a baseline and a reform
//! simulation. Creating one creates (or reuses) both simulations; the
//! comparison itself is dispatched once both have completed.

use axum::extract::{Path, State};
use axum::response::IntoResponse;
use axum::Json;
use microsim_core::job::JobKind;
use microsim_core::types::JobId;
use microsim_pipeline::service::EconomicImpactRequest;

use crate::error::AppResult;
use crate::handlers::create_status;
use crate::response::{CompositeJob, DataResponse};
use crate::state::AppState;

/// POST /api/v1/analysis/economic-impact
pub async fn create_economic_impact(
    State(state): State<AppState>,
    Json(input): Json<EconomicImpactRequest>,
) -> AppResult<impl IntoResponse> {
    let view = state.service.create_economic_impact(input).await?;

    tracing::info!(
        job_id = %view.job.id,
        created = view.created,
        baseline_id = %view.baseline.id,
        reform_id = %view.reform.id,
        "Economic impact requested",
    );

    Ok((
        create_status(view.created),
        Json(DataResponse {
            data: CompositeJob::created(view),
        }),
    ))
}

/// GET /api/v1/analysis/economic-impact/{id}
pub async fn get_economic_impact(
    State(state): State<AppState>,
    Path(id): Path<JobId>,
) -> AppResult<impl IntoResponse> {
    let view = state
        .service
        .resolve_composite(id, JobKind::EconomicImpact)
        .await?;
    Ok(Json(DataResponse {
        data: CompositeJob::polled(view),
    }))
}
