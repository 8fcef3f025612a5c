//! Mapping between [`JobStatus`] and the SMALLINT ids of the `job_statuses`
//! lookup table.
//!
//! Ids match the seed data order (1-based) in the migration.

use microsim_core::job::JobStatus;

/// Status ID type matching SMALLINT/SMALLSERIAL in the database.
pub type StatusId = i16;

pub const STATUS_PENDING: StatusId = 1;
pub const STATUS_RUNNING: StatusId = 2;
pub const STATUS_COMPLETED: StatusId = 3;
pub const STATUS_FAILED: StatusId = 4;

/// Return the database status ID for `status`.
pub fn status_id(status: JobStatus) -> StatusId {
    match status {
        JobStatus::Pending => STATUS_PENDING,
        JobStatus::Running => STATUS_RUNNING,
        JobStatus::Completed => STATUS_COMPLETED,
        JobStatus::Failed => STATUS_FAILED,
    }
}

/// Inverse of [`status_id`]; `None` for ids outside the seed data.
pub fn status_from_id(id: StatusId) -> Option<JobStatus> {
    match id {
        STATUS_PENDING => Some(JobStatus::Pending),
        STATUS_RUNNING => Some(JobStatus::Running),
        STATUS_COMPLETED => Some(JobStatus::Completed),
        STATUS_FAILED => Some(JobStatus::Failed),
        _ => None,
    }
}
