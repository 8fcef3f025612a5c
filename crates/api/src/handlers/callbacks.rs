//! Completion callbacks from the compute collaborator.

use axum::extract::{Path, State};
use axum::http::HeaderMap;
use axum::response::IntoResponse;
use axum::Json;
use microsim_core::error::CoreError;
use microsim_core::types::JobId;
use microsim_pipeline::service::CompletionReport;
use subtle::ConstantTimeEq;

use crate::error::AppResult;
use crate::response::{DataResponse, TransitionedJob};
use crate::state::AppState;

/// Header carrying the shared callback secret.
pub const CALLBACK_TOKEN_HEADER: &str = "x-callback-token";

/// POST /api/v1/callbacks/jobs/{id}
///
/// Body: `{"status": "running"|"completed"|"failed", "result"?, "error_message"?}`.
/// Repeating a transition already applied succeeds with `changed: false`;
/// anything the state machine forbids is 409.
pub async fn job_callback(
    State(state): State<AppState>,
    Path(id): Path<JobId>,
    headers: HeaderMap,
    Json(report): Json<CompletionReport>,
) -> AppResult<impl IntoResponse> {
    if let Some(expected) = state.config.callback_token.as_deref() {
        let accepted = headers
            .get(CALLBACK_TOKEN_HEADER)
            .is_some_and(|presented| bool::from(presented.as_bytes().ct_eq(expected.as_bytes())));
        if !accepted {
            tracing::warn!(job_id = %id, "Rejected callback with a missing or wrong token");
            return Err(CoreError::Unauthorized("Invalid callback token".into()).into());
        }
    }

    let status = report.status;
    let outcome = state.service.record_completion(id, report).await?;

    tracing::info!(
        job_id = %id,
        status = %status,
        changed = outcome.changed,
        "Job callback applied",
    );

    Ok(Json(DataResponse {
        data: TransitionedJob {
            job: outcome.job,
            changed: outcome.changed,
        },
    }))
}
