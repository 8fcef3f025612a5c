pub mod analysis;
pub mod callbacks;
pub mod household;
pub mod jobs;
pub mod simulations;

use axum::http::StatusCode;

/// `201 Created` for a new job, `200 OK` when an existing one was reused.
pub(crate) fn create_status(created: bool) -> StatusCode {
    if created {
        StatusCode::CREATED
    } else {
        StatusCode::OK
    }
}
