//! Job Record entity, creation DTO and conditional-update patch.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use flowgate_core::status::JobStatus;
use flowgate_core::types::{Amount, JobId, Payload, Timestamp};

/// A row from the `jobs` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct JobRecord {
    pub id: JobId,
    pub flow_key: String,
    /// Remote path of the flow at submission time; launch uses this rather
    /// than a registry lookup so a later flow rename does not strand the job.
    pub flow_path: String,
    pub identifier_from_purchaser: String,
    #[sqlx(rename = "status_id", try_from = "i16")]
    pub status: JobStatus,
    pub amount: Amount,
    pub payment_unit: String,
    pub agent_identifier: Option<String>,
    pub blockchain_identifier: Option<String>,
    pub input_hash: String,
    pub pay_by_at: Option<Timestamp>,
    pub submit_by_at: Option<Timestamp>,
    pub unlock_at: Option<Timestamp>,
    pub external_dispute_unlock_at: Option<Timestamp>,
    pub remote_run_id: Option<String>,
    pub remote_status: Option<String>,
    pub input_data: Payload,
    pub result_data: Option<Payload>,
    pub result_hash: Option<String>,
    pub error_message: Option<String>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
    pub started_at: Option<Timestamp>,
    pub completed_at: Option<Timestamp>,
}

impl JobRecord {
    /// The deadline that bounds the job's current phase: pay-by while
    /// waiting for payment, submit-by afterwards.
    pub fn active_deadline(&self) -> Option<Timestamp> {
        match self.status {
            JobStatus::PendingPayment => self.pay_by_at,
            _ => self.submit_by_at,
        }
    }
}

/// Keyset position after the last row of a page: `(created_at, id)`.
pub type PageCursor = (Timestamp, JobId);

/// Values for inserting a new job.
///
/// Only `pending_payment` and (for unpaid jobs) `payment_confirmed` are
/// valid initial statuses; the store rejects anything else.
#[derive(Debug, Clone)]
pub struct NewJob {
    pub id: JobId,
    pub flow_key: String,
    pub flow_path: String,
    pub identifier_from_purchaser: String,
    pub status: JobStatus,
    pub amount: Amount,
    pub payment_unit: String,
    pub agent_identifier: Option<String>,
    pub blockchain_identifier: Option<String>,
    pub input_hash: String,
    pub pay_by_at: Option<Timestamp>,
    pub submit_by_at: Option<Timestamp>,
    pub unlock_at: Option<Timestamp>,
    pub external_dispute_unlock_at: Option<Timestamp>,
    pub input_data: Payload,
}

/// A conditional update applied only while the record still holds the
/// expected prior status.
///
/// Constructed through the named constructors so that terminal patches always
/// carry exactly one of result or error, and non-terminal patches carry
/// neither.
#[derive(Debug, Clone, PartialEq)]
pub struct JobPatch {
    pub(crate) status: JobStatus,
    pub(crate) remote_run_id: Option<String>,
    pub(crate) remote_status: Option<String>,
    pub(crate) result_data: Option<Payload>,
    pub(crate) result_hash: Option<String>,
    pub(crate) error_message: Option<String>,
}

impl JobPatch {
    fn to(status: JobStatus) -> Self {
        Self {
            status,
            remote_run_id: None,
            remote_status: None,
            result_data: None,
            result_hash: None,
            error_message: None,
        }
    }

    /// `pending_payment -> payment_confirmed`.
    pub fn payment_confirmed() -> Self {
        Self::to(JobStatus::PaymentConfirmed)
    }

    /// `payment_confirmed -> starting`, recording the remote run id.
    pub fn starting(remote_run_id: impl Into<String>) -> Self {
        Self {
            remote_run_id: Some(remote_run_id.into()),
            ..Self::to(JobStatus::Starting)
        }
    }

    /// `starting -> running`.
    pub fn running() -> Self {
        Self::to(JobStatus::Running)
    }

    /// Keep the current status and record what the remote engine reported.
    pub fn observed(current: JobStatus, remote_status: impl Into<String>) -> Self {
        Self {
            remote_status: Some(remote_status.into()),
            ..Self::to(current)
        }
    }

    /// `running -> completed` with the result document and its hash.
    pub fn completed(result: Payload, result_hash: impl Into<String>) -> Self {
        Self {
            result_data: Some(result),
            result_hash: Some(result_hash.into()),
            ..Self::to(JobStatus::Completed)
        }
    }

    /// Any non-terminal status `-> failed`.
    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            error_message: Some(error.into()),
            ..Self::to(JobStatus::Failed)
        }
    }

    /// `pending_payment -> payment_expired`.
    pub fn payment_expired(error: impl Into<String>) -> Self {
        Self {
            error_message: Some(error.into()),
            ..Self::to(JobStatus::PaymentExpired)
        }
    }

    /// Attach the last remote status to a transition.
    pub fn with_remote_status(mut self, remote_status: impl Into<String>) -> Self {
        self.remote_status = Some(remote_status.into());
        self
    }

    /// Target status of this patch.
    pub fn status(&self) -> JobStatus {
        self.status
    }

    /// Apply the patch to an in-memory record.
    pub(crate) fn apply(&self, record: &mut JobRecord, now: Timestamp) {
        if let Some(run_id) = &self.remote_run_id {
            record.remote_run_id = Some(run_id.clone());
            record.started_at = Some(now);
        }
        if let Some(remote_status) = &self.remote_status {
            record.remote_status = Some(remote_status.clone());
        }
        if let Some(result) = &self.result_data {
            record.result_data = Some(result.clone());
        }
        if let Some(hash) = &self.result_hash {
            record.result_hash = Some(hash.clone());
        }
        if let Some(error) = &self.error_message {
            record.error_message = Some(error.clone());
        }
        if self.status.is_terminal() {
            record.completed_at = Some(now);
        }
        record.status = self.status;
        record.updated_at = now;
    }
}

/// Query parameters for listing jobs (admin view).
#[derive(Debug, Default, Deserialize)]
pub struct JobListQuery {
    /// Filter by status name (e.g. `running`).
    pub status: Option<JobStatus>,
    /// Filter by flow key.
    pub flow_key: Option<String>,
    /// Maximum number of results. Defaults to 50, capped at 100.
    pub limit: Option<i64>,
    /// Number of results to skip. Defaults to 0.
    pub offset: Option<i64>,
}
