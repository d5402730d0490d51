//! Job status views shared by `/jobs` and the MIP-003 status route.

use axum::extract::{Path, State};
use axum::response::IntoResponse;
use axum::Json;
use flowgate_core::hashing::result_text;
use flowgate_core::status::JobStatus;
use flowgate_core::types::{JobId, Payload, Timestamp};
use flowgate_db::models::job::JobRecord;
use serde::Serialize;

use crate::error::AppResult;
use crate::response::DataResponse;
use crate::state::AppState;

/// MIP-003 status name for an internal status.
///
/// Several internal states collapse onto one MIP-003 name, so views always
/// carry `job_status` as well; it is the only way to tell `payment_expired`
/// apart from `failed`.
pub fn mip003_status(status: JobStatus) -> &'static str {
    match status {
        JobStatus::PendingPayment => "awaiting_payment",
        JobStatus::PaymentConfirmed => "pending",
        JobStatus::Starting | JobStatus::Running => "running",
        JobStatus::Completed => "completed",
        JobStatus::Failed | JobStatus::PaymentExpired => "failed",
    }
}

/// Public view of a Job Record.
#[derive(Debug, Serialize)]
pub struct JobView {
    pub job_id: JobId,
    /// MIP-003 status name.
    pub status: &'static str,
    pub job_status: JobStatus,
    pub message: Option<String>,
    /// Textual output, set once completed.
    pub result: Option<String>,
    pub result_data: Option<Payload>,
    pub result_hash: Option<String>,
    pub error: Option<String>,
    pub flow_key: String,
    pub identifier_from_purchaser: String,
    pub blockchain_identifier: Option<String>,
    pub input_hash: String,
    pub remote_status: Option<String>,
    pub pay_by_time: Option<Timestamp>,
    pub submit_result_time: Option<Timestamp>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
    pub completed_at: Option<Timestamp>,
}

impl From<JobRecord> for JobView {
    fn from(job: JobRecord) -> Self {
        let message = match job.status {
            JobStatus::PendingPayment => Some("Waiting for payment confirmation".to_string()),
            JobStatus::PaymentConfirmed => Some("Payment confirmed, job is queued".to_string()),
            JobStatus::Starting | JobStatus::Running => Some("Job is being processed".to_string()),
            JobStatus::Completed => None,
            JobStatus::Failed | JobStatus::PaymentExpired => job.error_message.clone(),
        };

        Self {
            job_id: job.id,
            status: mip003_status(job.status),
            job_status: job.status,
            message,
            result: job.result_data.as_ref().map(result_text),
            result_data: job.result_data,
            result_hash: job.result_hash,
            error: job.error_message,
            flow_key: job.flow_key,
            identifier_from_purchaser: job.identifier_from_purchaser,
            blockchain_identifier: job.blockchain_identifier,
            input_hash: job.input_hash,
            remote_status: job.remote_status,
            pay_by_time: job.pay_by_at,
            submit_result_time: job.submit_by_at,
            created_at: job.created_at,
            updated_at: job.updated_at,
            completed_at: job.completed_at,
        }
    }
}

/// GET /jobs/{id}
pub async fn get_job(
    State(state): State<AppState>,
    Path(job_id): Path<JobId>,
) -> AppResult<impl IntoResponse> {
    let job = state.jobs.get(job_id).await?;
    Ok(Json(DataResponse {
        data: JobView::from(job),
    }))
}
