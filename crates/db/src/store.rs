//! Store seams used by the coordinator, the job service and the flow
//! registry, plus their Postgres implementations.

use async_trait::async_trait;
use flowgate_core::status::JobStatus;
use flowgate_core::types::JobId;

use crate::models::flow_config::{FlowConfig, UpsertFlowConfig};
use crate::models::job::{JobListQuery, JobPatch, JobRecord, NewJob, PageCursor};
use crate::repositories::{FlowConfigRepo, JobRepo};
use crate::DbPool;

/// Errors returned by [`JobStore`] and [`FlowConfigStore`] implementations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// The requested status change is not an edge of the lifecycle graph.
    #[error("Illegal transition from {from} to {to}")]
    IllegalTransition { from: JobStatus, to: JobStatus },

    #[error("Duplicate record: {0}")]
    Duplicate(String),

    #[error("Internal store error: {0}")]
    Internal(String),
}

/// Durable record of every job.
#[async_trait]
pub trait JobStore: Send + Sync {
    /// Insert a new record. Only `pending_payment` and `payment_confirmed`
    /// are accepted as initial statuses.
    async fn insert(&self, job: NewJob) -> Result<JobRecord, StoreError>;

    async fn find(&self, id: JobId) -> Result<Option<JobRecord>, StoreError>;

    /// Latest record created for a payment request.
    async fn find_by_blockchain_identifier(
        &self,
        blockchain_identifier: &str,
    ) -> Result<Option<JobRecord>, StoreError>;

    /// One page of records in any of `statuses`, ordered by
    /// `(created_at, id)`. Pass the last row of the previous page as
    /// `after` to continue; a page shorter than `limit` is the last one.
    async fn list_by_status(
        &self,
        statuses: &[JobStatus],
        after: Option<PageCursor>,
        limit: i64,
    ) -> Result<Vec<JobRecord>, StoreError>;

    /// Apply `patch` only while the record is still in `expected`.
    ///
    /// `Ok(None)` means the record had already moved on (or is missing):
    /// another writer won and the caller must not retry the side effect.
    /// An edge that is not in the lifecycle graph is rejected up front with
    /// [`StoreError::IllegalTransition`].
    async fn compare_and_set(
        &self,
        id: JobId,
        expected: JobStatus,
        patch: JobPatch,
    ) -> Result<Option<JobRecord>, StoreError>;

    /// Newest first, filtered and paginated.
    async fn list(&self, query: &JobListQuery) -> Result<Vec<JobRecord>, StoreError>;

    async fn health_check(&self) -> Result<(), StoreError>;
}

/// Persisted per-flow overrides (enable flag, agent identifier).
#[async_trait]
pub trait FlowConfigStore: Send + Sync {
    async fn list(&self) -> Result<Vec<FlowConfig>, StoreError>;

    async fn upsert(&self, input: UpsertFlowConfig) -> Result<FlowConfig, StoreError>;
}

/// Reject initial statuses other than the two entry points of the graph.
pub(crate) fn check_initial_status(job: &NewJob) -> Result<(), StoreError> {
    match job.status {
        JobStatus::PendingPayment | JobStatus::PaymentConfirmed => Ok(()),
        other => Err(StoreError::IllegalTransition {
            from: JobStatus::PendingPayment,
            to: other,
        }),
    }
}

/// Reject patches whose target is not reachable from `expected`.
pub(crate) fn check_transition(expected: JobStatus, patch: &JobPatch) -> Result<(), StoreError> {
    if expected.can_transition_to(patch.status()) {
        Ok(())
    } else {
        Err(StoreError::IllegalTransition {
            from: expected,
            to: patch.status(),
        })
    }
}

/// Map unique-violation errors to [`StoreError::Duplicate`].
fn map_insert_error(err: sqlx::Error) -> StoreError {
    match &err {
        sqlx::Error::Database(db) if db.is_unique_violation() => {
            StoreError::Duplicate(db.message().to_string())
        }
        _ => StoreError::Database(err),
    }
}

/// [`JobStore`] backed by the `jobs` table.
#[derive(Clone)]
pub struct PgJobStore {
    pool: DbPool,
}

impl PgJobStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl JobStore for PgJobStore {
    async fn insert(&self, job: NewJob) -> Result<JobRecord, StoreError> {
        check_initial_status(&job)?;
        JobRepo::insert(&self.pool, &job)
            .await
            .map_err(map_insert_error)
    }

    async fn find(&self, id: JobId) -> Result<Option<JobRecord>, StoreError> {
        Ok(JobRepo::find_by_id(&self.pool, id).await?)
    }

    async fn find_by_blockchain_identifier(
        &self,
        blockchain_identifier: &str,
    ) -> Result<Option<JobRecord>, StoreError> {
        Ok(JobRepo::find_by_blockchain_identifier(&self.pool, blockchain_identifier).await?)
    }

    async fn list_by_status(
        &self,
        statuses: &[JobStatus],
        after: Option<PageCursor>,
        limit: i64,
    ) -> Result<Vec<JobRecord>, StoreError> {
        Ok(JobRepo::list_by_status(&self.pool, statuses, after, limit).await?)
    }

    async fn compare_and_set(
        &self,
        id: JobId,
        expected: JobStatus,
        patch: JobPatch,
    ) -> Result<Option<JobRecord>, StoreError> {
        check_transition(expected, &patch)?;
        Ok(JobRepo::compare_and_set(&self.pool, id, expected, &patch).await?)
    }

    async fn list(&self, query: &JobListQuery) -> Result<Vec<JobRecord>, StoreError> {
        Ok(JobRepo::list(&self.pool, query).await?)
    }

    async fn health_check(&self) -> Result<(), StoreError> {
        Ok(crate::health_check(&self.pool).await?)
    }
}

/// [`FlowConfigStore`] backed by the `flow_configs` table.
#[derive(Clone)]
pub struct PgFlowConfigStore {
    pool: DbPool,
}

impl PgFlowConfigStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl FlowConfigStore for PgFlowConfigStore {
    async fn list(&self) -> Result<Vec<FlowConfig>, StoreError> {
        Ok(FlowConfigRepo::list(&self.pool).await?)
    }

    async fn upsert(&self, input: UpsertFlowConfig) -> Result<FlowConfig, StoreError> {
        Ok(FlowConfigRepo::upsert(&self.pool, &input).await?)
    }
}
