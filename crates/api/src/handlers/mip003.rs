//! Handlers for the MIP-003 agent interface.
//!
//! Responses are plain documents in the shape MIP-003 clients expect, not
//! wrapped in the `{ "data": ... }` envelope.

use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::response::IntoResponse;
use axum::Json;
use flowgate_core::error::CoreError;
use flowgate_core::status::JobStatus;
use flowgate_core::types::{Amount, JobId, Payload};
use flowgate_worker::{FlowDescriptor, SubmitJob};
use serde::{Deserialize, Serialize};
use serde_json::json;
use validator::Validate;

use crate::error::{AppError, AppResult};
use crate::handlers::jobs::JobView;
use crate::state::AppState;

const SERVICE_TYPE: &str = "masumi-agent";

fn find_flow(state: &AppState, flow_key: &str) -> AppResult<Arc<FlowDescriptor>> {
    state.registry.get(flow_key).ok_or_else(|| {
        AppError::Core(CoreError::NotFound {
            entity: "Flow",
            id: flow_key.to_string(),
        })
    })
}

// ---------------------------------------------------------------------------
// Availability
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
pub struct AvailabilityResponse {
    pub status: &'static str,
    #[serde(rename = "type")]
    pub kind: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub flow_key: Option<String>,
    pub message: String,
}

/// GET /mip003/availability
///
/// Available while at least one flow accepts jobs.
pub async fn availability(State(state): State<AppState>) -> Json<AvailabilityResponse> {
    let active = state.registry.active().len();
    let (status, message) = if active > 0 {
        ("available", format!("{active} flow(s) accepting jobs"))
    } else {
        ("unavailable", "No flows are enabled".to_string())
    };

    Json(AvailabilityResponse {
        status,
        kind: SERVICE_TYPE,
        flow_key: None,
        message,
    })
}

/// GET /mip003/{flow_key}/availability
pub async fn flow_availability(
    State(state): State<AppState>,
    Path(flow_key): Path<String>,
) -> AppResult<impl IntoResponse> {
    let flow = find_flow(&state, &flow_key)?;
    let (status, message) = if flow.is_active() {
        ("available", format!("{} is accepting jobs", flow.name))
    } else {
        ("unavailable", format!("{} is not enabled", flow.name))
    };

    Ok(Json(AvailabilityResponse {
        status,
        kind: SERVICE_TYPE,
        flow_key: Some(flow.key.clone()),
        message,
    }))
}

// ---------------------------------------------------------------------------
// Input schema
// ---------------------------------------------------------------------------

/// GET /mip003/{flow_key}/input_schema
///
/// Passes the discovered schema through unchanged; an empty list when the
/// engine did not provide one.
pub async fn input_schema(
    State(state): State<AppState>,
    Path(flow_key): Path<String>,
) -> AppResult<impl IntoResponse> {
    let flow = find_flow(&state, &flow_key)?;
    let schema = flow.input_schema.clone().unwrap_or_else(|| json!([]));
    Ok(Json(json!({ "input_data": schema })))
}

// ---------------------------------------------------------------------------
// Start job
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize, Validate)]
pub struct StartJobRequest {
    #[validate(length(min = 1, max = 256))]
    pub identifier_from_purchaser: String,
    #[serde(default)]
    pub input_data: Payload,
}

#[derive(Debug, Serialize)]
pub struct AmountView {
    pub amount: Amount,
    pub unit: String,
}

/// Times are Unix seconds.
#[derive(Debug, Serialize)]
pub struct StartJobResponse {
    pub status: &'static str,
    pub job_id: JobId,
    #[serde(rename = "blockchainIdentifier")]
    pub blockchain_identifier: Option<String>,
    #[serde(rename = "payByTime")]
    pub pay_by_time: Option<i64>,
    #[serde(rename = "submitResultTime")]
    pub submit_result_time: Option<i64>,
    #[serde(rename = "unlockTime")]
    pub unlock_time: Option<i64>,
    #[serde(rename = "externalDisputeUnlockTime")]
    pub external_dispute_unlock_time: Option<i64>,
    #[serde(rename = "agentIdentifier")]
    pub agent_identifier: Option<String>,
    #[serde(rename = "sellerVKey")]
    pub seller_vkey: Option<String>,
    #[serde(rename = "identifierFromPurchaser")]
    pub identifier_from_purchaser: String,
    pub amounts: Vec<AmountView>,
    pub input_hash: String,
    /// Internal status after submission (`pending_payment` for paid jobs).
    pub job_status: JobStatus,
}

/// POST /mip003/{flow_key}/start_job
///
/// Creates a job priced at the configured amount. The payment request is
/// made before returning; the job itself starts once payment is observed.
pub async fn start_job(
    State(state): State<AppState>,
    Path(flow_key): Path<String>,
    Json(input): Json<StartJobRequest>,
) -> AppResult<impl IntoResponse> {
    input.validate()?;

    let input_data = if input.input_data.is_null() {
        json!({})
    } else {
        input.input_data
    };

    let job = state
        .jobs
        .submit(SubmitJob {
            flow_key,
            identifier_from_purchaser: input.identifier_from_purchaser,
            input: input_data,
            amount: state.payment.amount,
            payment_unit: state.payment.unit.clone(),
        })
        .await?;

    tracing::info!(
        job_id = %job.id,
        flow_key = %job.flow_key,
        status = %job.status,
        "Job started via MIP-003",
    );

    Ok(Json(StartJobResponse {
        status: "success",
        job_id: job.id,
        blockchain_identifier: job.blockchain_identifier,
        pay_by_time: job.pay_by_at.map(|t| t.timestamp()),
        submit_result_time: job.submit_by_at.map(|t| t.timestamp()),
        unlock_time: job.unlock_at.map(|t| t.timestamp()),
        external_dispute_unlock_time: job.external_dispute_unlock_at.map(|t| t.timestamp()),
        agent_identifier: job.agent_identifier,
        seller_vkey: state.payment.seller_vkey.clone(),
        identifier_from_purchaser: job.identifier_from_purchaser,
        amounts: vec![AmountView {
            amount: job.amount,
            unit: job.payment_unit,
        }],
        input_hash: job.input_hash,
        job_status: job.status,
    }))
}

// ---------------------------------------------------------------------------
// Status
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub struct StatusQuery {
    pub job_id: JobId,
}

/// GET /mip003/{flow_key}/status?job_id=
///
/// A job belonging to a different flow is reported as not found.
pub async fn job_status(
    State(state): State<AppState>,
    Path(flow_key): Path<String>,
    Query(query): Query<StatusQuery>,
) -> AppResult<impl IntoResponse> {
    let job = state.jobs.get(query.job_id).await?;
    if job.flow_key != flow_key {
        return Err(AppError::Core(CoreError::NotFound {
            entity: "Job",
            id: query.job_id.to_string(),
        }));
    }
    Ok(Json(JobView::from(job)))
}
