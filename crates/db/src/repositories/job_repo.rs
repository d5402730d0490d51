//! Repository for the `jobs` table.
//!
//! Every status change goes through [`JobRepo::compare_and_set`], which only
//! writes while the row still holds the expected prior status.

use sqlx::PgPool;
use flowgate_core::status::{JobStatus, StatusId};
use flowgate_core::types::JobId;

use crate::models::job::{JobListQuery, JobPatch, JobRecord, NewJob, PageCursor};

/// Column list for `jobs` queries.
const COLUMNS: &str = "\
    id, flow_key, flow_path, identifier_from_purchaser, status_id, \
    amount, payment_unit, agent_identifier, blockchain_identifier, input_hash, \
    pay_by_at, submit_by_at, unlock_at, external_dispute_unlock_at, \
    remote_run_id, remote_status, \
    input_data, result_data, result_hash, error_message, \
    created_at, updated_at, started_at, completed_at";

/// Maximum page size for job listing.
const MAX_LIMIT: i64 = 100;

/// Default page size for job listing.
const DEFAULT_LIMIT: i64 = 50;

/// Provides query operations for job records.
pub struct JobRepo;

impl JobRepo {
    /// Insert a new job row.
    pub async fn insert(pool: &PgPool, job: &NewJob) -> Result<JobRecord, sqlx::Error> {
        let query = format!(
            "INSERT INTO jobs \
                 (id, flow_key, flow_path, identifier_from_purchaser, status_id, \
                  amount, payment_unit, agent_identifier, blockchain_identifier, input_hash, \
                  pay_by_at, submit_by_at, unlock_at, external_dispute_unlock_at, input_data) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15) \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, JobRecord>(&query)
            .bind(job.id)
            .bind(&job.flow_key)
            .bind(&job.flow_path)
            .bind(&job.identifier_from_purchaser)
            .bind(job.status.id())
            .bind(job.amount)
            .bind(&job.payment_unit)
            .bind(&job.agent_identifier)
            .bind(&job.blockchain_identifier)
            .bind(&job.input_hash)
            .bind(job.pay_by_at)
            .bind(job.submit_by_at)
            .bind(job.unlock_at)
            .bind(job.external_dispute_unlock_at)
            .bind(&job.input_data)
            .fetch_one(pool)
            .await
    }

    /// Find a job by its ID.
    pub async fn find_by_id(pool: &PgPool, id: JobId) -> Result<Option<JobRecord>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM jobs WHERE id = $1");
        sqlx::query_as::<_, JobRecord>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// Find the job a payment request was created for.
    pub async fn find_by_blockchain_identifier(
        pool: &PgPool,
        blockchain_identifier: &str,
    ) -> Result<Option<JobRecord>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM jobs WHERE blockchain_identifier = $1 \
             ORDER BY created_at DESC LIMIT 1"
        );
        sqlx::query_as::<_, JobRecord>(&query)
            .bind(blockchain_identifier)
            .fetch_optional(pool)
            .await
    }

    /// One keyset page of jobs in one of `statuses`, ordered by
    /// `(created_at, id)` and starting strictly after `after`.
    pub async fn list_by_status(
        pool: &PgPool,
        statuses: &[JobStatus],
        after: Option<PageCursor>,
        limit: i64,
    ) -> Result<Vec<JobRecord>, sqlx::Error> {
        let ids: Vec<StatusId> = statuses.iter().map(|s| s.id()).collect();
        let (after_created, after_id) = after.unzip();
        let query = format!(
            "SELECT {COLUMNS} FROM jobs \
             WHERE status_id = ANY($1) \
               AND ($2::timestamptz IS NULL OR (created_at, id) > ($2, $3::uuid)) \
             ORDER BY created_at ASC, id ASC \
             LIMIT $4"
        );
        sqlx::query_as::<_, JobRecord>(&query)
            .bind(&ids)
            .bind(after_created)
            .bind(after_id)
            .bind(limit)
            .fetch_all(pool)
            .await
    }

    /// Apply `patch` only if the row is still in `expected`.
    ///
    /// Returns `None` when the row moved on (or does not exist); the caller
    /// treats that as another writer having won.
    pub async fn compare_and_set(
        pool: &PgPool,
        id: JobId,
        expected: JobStatus,
        patch: &JobPatch,
    ) -> Result<Option<JobRecord>, sqlx::Error> {
        let query = format!(
            "UPDATE jobs SET \
                 status_id = $3, \
                 remote_run_id = COALESCE($4, remote_run_id), \
                 started_at = CASE WHEN $4 IS NULL THEN started_at ELSE NOW() END, \
                 remote_status = COALESCE($5, remote_status), \
                 result_data = COALESCE($6, result_data), \
                 result_hash = COALESCE($7, result_hash), \
                 error_message = COALESCE($8, error_message), \
                 completed_at = CASE WHEN $9 THEN NOW() ELSE completed_at END, \
                 updated_at = NOW() \
             WHERE id = $1 AND status_id = $2 \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, JobRecord>(&query)
            .bind(id)
            .bind(expected.id())
            .bind(patch.status.id())
            .bind(&patch.remote_run_id)
            .bind(&patch.remote_status)
            .bind(&patch.result_data)
            .bind(&patch.result_hash)
            .bind(&patch.error_message)
            .bind(patch.status.is_terminal())
            .fetch_optional(pool)
            .await
    }

    /// List jobs newest first with optional filters and pagination.
    pub async fn list(pool: &PgPool, params: &JobListQuery) -> Result<Vec<JobRecord>, sqlx::Error> {
        let (limit, offset) = page_bounds(params);

        let mut conditions: Vec<String> = Vec::new();
        let mut bind_idx: u32 = 1;

        if params.status.is_some() {
            conditions.push(format!("status_id = ${bind_idx}"));
            bind_idx += 1;
        }
        if params.flow_key.is_some() {
            conditions.push(format!("flow_key = ${bind_idx}"));
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
             ORDER BY created_at DESC \
             LIMIT ${bind_idx} OFFSET ${}",
            bind_idx + 1,
        );

        let mut q = sqlx::query_as::<_, JobRecord>(&query);
        if let Some(status) = params.status {
            q = q.bind(status.id());
        }
        if let Some(flow_key) = &params.flow_key {
            q = q.bind(flow_key);
        }
        q = q.bind(limit).bind(offset);

        q.fetch_all(pool).await
    }
}

/// Clamp a listing query the same way [`JobRepo::list`] does.
pub(crate) fn page_bounds(params: &JobListQuery) -> (i64, i64) {
    let limit = params.limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT);
    let offset = params.offset.unwrap_or(0).max(0);
    (limit, offset)
}
