//! PostgreSQL-backed [`JobStore`] over the `jobs` table.
//!
//! Deduplication relies on the primary key: `INSERT .. ON CONFLICT DO
//! NOTHING` either inserts the row or reports that another caller already
//! did, with no read-then-write window. Transitions are conditional updates
//! keyed on the status the caller observed, so two racing transitions cannot
//! both succeed.

use async_trait::async_trait;
use microsim_core::error::CoreError;
use microsim_core::job::{Job, JobInputs, JobStatus, Transition, TransitionCheck};
use microsim_core::types::{JobId, Timestamp};
use sqlx::PgPool;

use crate::models::job::{JobListQuery, JobRow};
use crate::models::status::status_id;
use crate::store::{CreateOutcome, JobStore, TransitionOutcome};

/// Column list for `jobs` queries.
const COLUMNS: &str = "\
    id, kind, status_id, inputs, result, error_message, \
    created_at, started_at, completed_at";

/// Upper bound on re-reads when a conditional update loses a race. The state
/// machine has at most two forward steps, so a handful always suffices.
const MAX_TRANSITION_ATTEMPTS: usize = 4;

/// Map a sqlx error into the store's error taxonomy.
fn storage_error(err: sqlx::Error) -> CoreError {
    tracing::error!(error = %err, "Job store query failed");
    CoreError::StorageUnavailable(err.to_string())
}

/// Job store backed by a Postgres connection pool.
#[derive(Clone)]
pub struct PgJobStore {
    pool: PgPool,
}

impl PgJobStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn find_by_id(&self, id: JobId) -> Result<Option<Job>, CoreError> {
        let query = format!("SELECT {COLUMNS} FROM jobs WHERE id = $1");
        sqlx::query_as::<_, JobRow>(&query)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(storage_error)?
            .map(Job::try_from)
            .transpose()
    }

    /// Write `next` over the row only if it is still in `current`'s status.
    /// Returns `None` when another writer got there first.
    async fn compare_and_set(&self, current: &Job, next: &Job) -> Result<Option<Job>, CoreError> {
        let query = format!(
            "UPDATE jobs \
             SET status_id = $3, result = $4, error_message = $5, \
                 started_at = $6, completed_at = $7, updated_at = NOW() \
             WHERE id = $1 AND status_id = $2 \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, JobRow>(&query)
            .bind(current.id)
            .bind(status_id(current.status))
            .bind(status_id(next.status))
            .bind(&next.result)
            .bind(&next.error_message)
            .bind(next.started_at)
            .bind(next.completed_at)
            .fetch_optional(&self.pool)
            .await
            .map_err(storage_error)?
            .map(Job::try_from)
            .transpose()
    }
}

#[async_trait]
impl JobStore for PgJobStore {
    async fn create_if_absent(
        &self,
        id: JobId,
        inputs: &JobInputs,
    ) -> Result<CreateOutcome, CoreError> {
        let inputs_json = serde_json::to_value(inputs)
            .map_err(|e| CoreError::Internal(format!("Failed to serialize job inputs: {e}")))?;

        let query = format!(
            "INSERT INTO jobs (id, kind, status_id, inputs, prerequisite_ids) \
             VALUES ($1, $2, $3, $4, $5) \
             ON CONFLICT (id) DO NOTHING \
             RETURNING {COLUMNS}"
        );
        let inserted = sqlx::query_as::<_, JobRow>(&query)
            .bind(id)
            .bind(inputs.kind().as_str())
            .bind(status_id(JobStatus::Pending))
            .bind(&inputs_json)
            .bind(inputs.prerequisite_ids())
            .fetch_optional(&self.pool)
            .await
            .map_err(storage_error)?;

        if let Some(row) = inserted {
            return Ok(CreateOutcome {
                job: Job::try_from(row)?,
                created: true,
            });
        }

        // Lost the insert race (or the job was cached): read the winner.
        let existing = self.find_by_id(id).await?.ok_or_else(|| {
            CoreError::Internal(format!("Job {id} conflicted on insert but cannot be read"))
        })?;
        Ok(CreateOutcome {
            job: existing,
            created: false,
        })
    }

    async fn get(&self, id: JobId) -> Result<Job, CoreError> {
        self.find_by_id(id)
            .await?
            .ok_or_else(|| CoreError::job_not_found(id))
    }

    async fn transition(
        &self,
        id: JobId,
        transition: Transition,
        at: Timestamp,
    ) -> Result<TransitionOutcome, CoreError> {
        for _ in 0..MAX_TRANSITION_ATTEMPTS {
            let current = self.get(id).await?;

            if current.check_transition(&transition)? == TransitionCheck::AlreadyApplied {
                return Ok(TransitionOutcome {
                    job: current,
                    changed: false,
                });
            }

            let mut next = current.clone();
            next.apply(transition.clone(), at)?;

            if let Some(job) = self.compare_and_set(&current, &next).await? {
                return Ok(TransitionOutcome { job, changed: true });
            }

            tracing::debug!(
                job_id = %id,
                from = %current.status,
                to = %transition.target(),
                "Conditional job update lost a race, re-reading",
            );
        }

        Err(CoreError::Conflict(format!(
            "Job {id} kept changing while applying {} transition",
            transition.target()
        )))
    }

    async fn list(&self, params: &JobListQuery) -> Result<Vec<Job>, CoreError> {
        // Build the WHERE clause and track the next bind parameter index.
        let mut conditions: Vec<String> = Vec::new();
        let mut bind_idx: u32 = 1;

        if params.kind.is_some() {
            conditions.push(format!("kind = ${bind_idx}"));
            bind_idx += 1;
        }
        if params.status.is_some() {
            conditions.push(format!("status_id = ${bind_idx}"));
            bind_idx += 1;
        }
        if params.depends_on.is_some() {
            conditions.push(format!("${bind_idx} = ANY(prerequisite_ids)"));
            bind_idx += 1;
        }

        let where_clause = if conditions.is_empty() {
            String::new()
        } else {
            format!("WHERE {}", conditions.join(" AND "))
        };

        let query = format!(
            "SELECT {COLUMNS} FROM jobs \
             {where_clause} \
             ORDER BY created_at ASC, id ASC \
             LIMIT ${bind_idx} OFFSET ${}",
            bind_idx + 1,
        );

        let mut q = sqlx::query_as::<_, JobRow>(&query);
        if let Some(kind) = params.kind {
            q = q.bind(kind.as_str());
        }
        if let Some(status) = params.status {
            q = q.bind(status_id(status));
        }
        if let Some(prerequisite) = params.depends_on {
            q = q.bind(prerequisite);
        }
        q = q.bind(params.effective_limit()).bind(params.effective_offset());

        q.fetch_all(&self.pool)
            .await
            .map_err(storage_error)?
            .into_iter()
            .map(Job::try_from)
            .collect()
    }

    async fn is_healthy(&self) -> bool {
        crate::health_check(&self.pool).await.is_ok()
    }
}
