//! Route definitions for operator endpoints.
//!
//! No authentication is applied here; deployments expose `/admin` only on
//! a trusted network.

use axum::routing::{get, post};
use axum::Router;

use crate::handlers::admin;
use crate::state::AppState;

/// Routes mounted at `/admin`.
///
/// ```text
/// GET    /flows                      -> list_flows
/// POST   /flows/reload               -> reload_flows
/// POST   /flows/{flow_key}/enable    -> enable_flow
/// POST   /flows/{flow_key}/disable   -> disable_flow
/// GET    /jobs                       -> list_jobs
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/flows", get(admin::list_flows))
        .route("/flows/reload", post(admin::reload_flows))
        .route("/flows/{flow_key}/enable", post(admin::enable_flow))
        .route("/flows/{flow_key}/disable", post(admin::disable_flow))
        .route("/jobs", get(admin::list_jobs))
}
