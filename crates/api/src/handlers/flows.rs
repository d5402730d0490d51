use axum::extract::State;
use axum::response::IntoResponse;
use axum::Json;
use serde::Serialize;

use crate::response::DataResponse;
use crate::state::AppState;

/// A flow as shown to purchasers.
#[derive(Debug, Serialize)]
pub struct FlowSummary {
    pub key: String,
    pub name: String,
    pub description: String,
    pub version: String,
    pub author: String,
    pub tags: Vec<String>,
}

/// GET /flows
///
/// Only flows currently accepting jobs.
pub async fn list_enabled_flows(State(state): State<AppState>) -> impl IntoResponse {
    let flows: Vec<FlowSummary> = state
        .registry
        .active()
        .into_iter()
        .map(|f| FlowSummary {
            key: f.key.clone(),
            name: f.name.clone(),
            description: f.description.clone(),
            version: f.version.clone(),
            author: f.author.clone(),
            tags: f.tags.clone(),
        })
        .collect();

    Json(DataResponse { data: flows })
}
