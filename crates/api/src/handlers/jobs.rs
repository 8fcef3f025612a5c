use axum::extract::{Path, Query, State};
use axum::response::IntoResponse;
use axum::Json;
use microsim_core::types::JobId;
use microsim_db::models::job::JobListQuery;

use crate::error::AppResult;
use crate::response::DataResponse;
use crate::state::AppState;

/// GET /api/v1/jobs
///
/// Supports optional `kind`, `status`, `depends_on`, `limit` and `offset`
/// query parameters.
pub async fn list_jobs(
    State(state): State<AppState>,
    Query(params): Query<JobListQuery>,
) -> AppResult<impl IntoResponse> {
    let jobs = state.service.list(&params).await?;
    Ok(Json(DataResponse { data: jobs }))
}

/// GET /api/v1/jobs/{id}
pub async fn get_job(
    State(state): State<AppState>,
    Path(id): Path<JobId>,
) -> AppResult<impl IntoResponse> {
    let job = state.service.resolve(id).await?;
    Ok(Json(DataResponse { data: job }))
}
