//! Shared response envelope types for API handlers.
//!
//! All API responses use a `{ "data": ... }` envelope. Use [`DataResponse`]
//! instead of ad-hoc `serde_json::json!({ "data": ... })`.

use microsim_core::job::Job;
use microsim_pipeline::service::{CompositeView, Created, JobSummary};
use serde::Serialize;

/// Standard `{ "data": T }` response envelope.
#[derive(Debug, Serialize)]
pub struct DataResponse<T: Serialize> {
    pub data: T,
}

/// A job returned from a create endpoint.
#[derive(Debug, Serialize)]
pub struct CreatedJob {
    #[serde(flatten)]
    pub job: Job,
    /// `false` when an identical earlier request's job was reused.
    pub created: bool,
}

impl From<Created> for CreatedJob {
    fn from(created: Created) -> Self {
        Self {
            job: created.job,
            created: created.created,
        }
    }
}

/// A composite job with the status of its prerequisites.
#[derive(Debug, Serialize)]
pub struct CompositeJob {
    #[serde(flatten)]
    pub job: Job,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created: Option<bool>,
    pub baseline: JobSummary,
    pub reform: JobSummary,
}

impl CompositeJob {
    /// Response for a create endpoint, carrying `created`.
    pub fn created(view: CompositeView) -> Self {
        let created = view.created;
        Self {
            created: Some(created),
            ..Self::polled(view)
        }
    }

    /// Response for a status poll.
    pub fn polled(view: CompositeView) -> Self {
        Self {
            job: view.job,
            created: None,
            baseline: view.baseline,
            reform: view.reform,
        }
    }
}

/// Job after a callback was applied.
#[derive(Debug, Serialize)]
pub struct TransitionedJob {
    #[serde(flatten)]
    pub job: Job,
    /// `false` when the callback repeated a transition already applied.
    pub changed: bool,
}
