//! Event type names for job lifecycle events published on the event bus.

use crate::job::JobStatus;

/// Entity type recorded on job lifecycle events.
pub const ENTITY_JOB: &str = "job";

/// A new job record was created (a cached job being reused emits nothing).
pub const EVENT_JOB_CREATED: &str = "job.created";

/// Compute for a job was dispatched.
pub const EVENT_JOB_RUNNING: &str = "job.running";

/// A job completed with a result.
pub const EVENT_JOB_COMPLETED: &str = "job.completed";

/// A job failed with an error message.
pub const EVENT_JOB_FAILED: &str = "job.failed";

/// Event type published when a job enters `status`.
pub fn event_type_for(status: JobStatus) -> &'static str {
    match status {
        JobStatus::Pending => EVENT_JOB_CREATED,
        JobStatus::Running => EVENT_JOB_RUNNING,
        JobStatus::Completed => EVENT_JOB_COMPLETED,
        JobStatus::Failed => EVENT_JOB_FAILED,
    }
}
