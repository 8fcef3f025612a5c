//! In-process job store.
//!
//! Backs development runs without `DATABASE_URL` and the orchestration tests.
//! A single write lock around the map gives create-if-absent and transitions
//! the same atomicity the Postgres store gets from its primary key and
//! conditional updates.

use std::collections::HashMap;

use async_trait::async_trait;
use microsim_core::error::CoreError;
use microsim_core::job::{Job, JobInputs, Transition};
use microsim_core::types::{JobId, Timestamp};
use tokio::sync::RwLock;

use crate::models::job::JobListQuery;
use crate::store::{CreateOutcome, JobStore, TransitionOutcome};

#[derive(Default)]
struct Inner {
    jobs: HashMap<JobId, Job>,
    /// Insertion order for listing.
    order: Vec<JobId>,
}

/// Job store held entirely in memory. Nothing survives a restart.
#[derive(Default)]
pub struct MemoryJobStore {
    inner: RwLock<Inner>,
}

impl MemoryJobStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored jobs.
    pub async fn len(&self) -> usize {
        self.inner.read().await.order.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

#[async_trait]
impl JobStore for MemoryJobStore {
    async fn create_if_absent(
        &self,
        id: JobId,
        inputs: &JobInputs,
    ) -> Result<CreateOutcome, CoreError> {
        let mut inner = self.inner.write().await;

        if let Some(existing) = inner.jobs.get(&id) {
            return Ok(CreateOutcome {
                job: existing.clone(),
                created: false,
            });
        }

        let job = Job::new_pending(id, inputs.clone(), chrono::Utc::now());
        inner.jobs.insert(id, job.clone());
        inner.order.push(id);
        Ok(CreateOutcome { job, created: true })
    }

    async fn get(&self, id: JobId) -> Result<Job, CoreError> {
        self.inner
            .read()
            .await
            .jobs
            .get(&id)
            .cloned()
            .ok_or_else(|| CoreError::job_not_found(id))
    }

    async fn transition(
        &self,
        id: JobId,
        transition: Transition,
        at: Timestamp,
    ) -> Result<TransitionOutcome, CoreError> {
        let mut inner = self.inner.write().await;
        let job = inner
            .jobs
            .get_mut(&id)
            .ok_or_else(|| CoreError::job_not_found(id))?;

        let changed = job.apply(transition, at)?;
        Ok(TransitionOutcome {
            job: job.clone(),
            changed,
        })
    }

    async fn list(&self, query: &JobListQuery) -> Result<Vec<Job>, CoreError> {
        let inner = self.inner.read().await;
        let offset = usize::try_from(query.effective_offset()).unwrap_or(usize::MAX);
        let limit = usize::try_from(query.effective_limit()).unwrap_or(0);

        Ok(inner
            .order
            .iter()
            .filter_map(|id| inner.jobs.get(id))
            .filter(|job| query.matches(job))
            .skip(offset)
            .take(limit)
            .cloned()
            .collect())
    }

    async fn is_healthy(&self) -> bool {
        true
    }
}
