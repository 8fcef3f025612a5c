//! Row model for the `jobs` table and the listing filter.

use microsim_core::error::CoreError;
use microsim_core::job::{Job, JobInputs, JobKind, JobStatus};
use microsim_core::types::{JobId, Timestamp};
use serde::Deserialize;
use sqlx::FromRow;

use super::status::{status_from_id, StatusId};

/// Maximum page size for job listing.
pub const MAX_LIMIT: i64 = 100;

/// Default page size for job listing.
pub const DEFAULT_LIMIT: i64 = 50;

/// A raw row from the `jobs` table.
#[derive(Debug, Clone, FromRow)]
pub struct JobRow {
    pub id: JobId,
    pub kind: String,
    pub status_id: StatusId,
    pub inputs: serde_json::Value,
    pub result: Option<serde_json::Value>,
    pub error_message: Option<String>,
    pub created_at: Timestamp,
    pub started_at: Option<Timestamp>,
    pub completed_at: Option<Timestamp>,
}

impl TryFrom<JobRow> for Job {
    type Error = CoreError;

    fn try_from(row: JobRow) -> Result<Self, Self::Error> {
        let kind: JobKind = row.kind.parse()?;
        let status = status_from_id(row.status_id).ok_or_else(|| {
            CoreError::Internal(format!(
                "Job {} has unknown status_id {}",
                row.id, row.status_id
            ))
        })?;
        let inputs: JobInputs = serde_json::from_value(row.inputs).map_err(|e| {
            CoreError::Internal(format!("Job {} has malformed inputs: {e}", row.id))
        })?;
        if inputs.kind() != kind {
            return Err(CoreError::Internal(format!(
                "Job {} kind column '{kind}' disagrees with inputs '{}'",
                row.id,
                inputs.kind()
            )));
        }

        Ok(Job {
            id: row.id,
            kind,
            status,
            inputs,
            result: row.result,
            error_message: row.error_message,
            created_at: row.created_at,
            started_at: row.started_at,
            completed_at: row.completed_at,
        })
    }
}

/// Filter for listing jobs, also used as the `GET /jobs` query string.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct JobListQuery {
    pub kind: Option<JobKind>,
    pub status: Option<JobStatus>,
    /// Only composites that reference this prerequisite.
    pub depends_on: Option<JobId>,
    /// Maximum number of results. Defaults to 50, capped at 100.
    pub limit: Option<i64>,
    /// Number of results to skip. Defaults to 0.
    pub offset: Option<i64>,
}

impl JobListQuery {
    pub fn effective_limit(&self) -> i64 {
        self.limit.unwrap_or(DEFAULT_LIMIT).clamp(0, MAX_LIMIT)
    }

    pub fn effective_offset(&self) -> i64 {
        self.offset.unwrap_or(0).max(0)
    }

    /// Whether `job` passes the kind/status/depends_on filters.
    pub fn matches(&self, job: &Job) -> bool {
        self.kind.map_or(true, |kind| job.kind == kind)
            && self.status.map_or(true, |status| job.status == status)
            && self
                .depends_on
                .map_or(true, |id| job.inputs.prerequisite_ids().contains(&id))
    }
}
