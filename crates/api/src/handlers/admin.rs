//! Operator handlers: flow configuration and job listing.

use axum::extract::{Path, Query, State};
use axum::response::IntoResponse;
use axum::Json;
use flowgate_core::types::Timestamp;
use flowgate_db::models::job::JobListQuery;
use flowgate_worker::FlowDescriptor;
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::error::AppResult;
use crate::handlers::jobs::JobView;
use crate::response::DataResponse;
use crate::state::AppState;

// ---------------------------------------------------------------------------
// Flows
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
pub struct FlowListing {
    /// When discovery last succeeded; `None` before the first reload.
    pub loaded_at: Option<Timestamp>,
    pub flows: Vec<FlowDescriptor>,
}

/// GET /admin/flows
///
/// Every discovered flow with its enable flag and payment identifier.
pub async fn list_flows(State(state): State<AppState>) -> impl IntoResponse {
    let snapshot = state.registry.snapshot();
    let flows = state
        .registry
        .list()
        .iter()
        .map(|f| FlowDescriptor::clone(f))
        .collect();
    Json(DataResponse {
        data: FlowListing {
            loaded_at: snapshot.loaded_at,
            flows,
        },
    })
}

#[derive(Debug, Serialize)]
pub struct ReloadResponse {
    pub flow_count: usize,
}

/// POST /admin/flows/reload
///
/// On failure the previous flow list stays in effect.
pub async fn reload_flows(State(state): State<AppState>) -> AppResult<impl IntoResponse> {
    let flow_count = state.registry.reload().await?;
    tracing::info!(flow_count, "Flows reloaded by operator");
    Ok(Json(DataResponse {
        data: ReloadResponse { flow_count },
    }))
}

#[derive(Debug, Deserialize, Validate)]
pub struct EnableFlowRequest {
    #[validate(length(min = 1, max = 256))]
    pub agent_identifier: String,
}

/// POST /admin/flows/{flow_key}/enable
pub async fn enable_flow(
    State(state): State<AppState>,
    Path(flow_key): Path<String>,
    Json(input): Json<EnableFlowRequest>,
) -> AppResult<impl IntoResponse> {
    input.validate()?;
    let flow = state.registry.enable(&flow_key, &input.agent_identifier).await?;
    tracing::info!(flow_key = %flow.key, "Flow enabled");
    Ok(Json(DataResponse {
        data: FlowDescriptor::clone(&flow),
    }))
}

/// POST /admin/flows/{flow_key}/disable
pub async fn disable_flow(
    State(state): State<AppState>,
    Path(flow_key): Path<String>,
) -> AppResult<impl IntoResponse> {
    let flow = state.registry.disable(&flow_key).await?;
    tracing::info!(flow_key = %flow.key, "Flow disabled");
    Ok(Json(DataResponse {
        data: FlowDescriptor::clone(&flow),
    }))
}

// ---------------------------------------------------------------------------
// Jobs
// ---------------------------------------------------------------------------

/// GET /admin/jobs?status=&flow_key=&limit=&offset=
///
/// Newest first. `limit` defaults to 50 and is capped at 100.
pub async fn list_jobs(
    State(state): State<AppState>,
    Query(params): Query<JobListQuery>,
) -> AppResult<impl IntoResponse> {
    let jobs = state.jobs.list(&params).await?;
    let data: Vec<JobView> = jobs.into_iter().map(JobView::from).collect();
    Ok(Json(DataResponse { data }))
}
