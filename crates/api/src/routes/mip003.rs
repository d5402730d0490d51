//! Route definitions for the MIP-003 agent interface.

use axum::routing::{get, post};
use axum::Router;

use crate::handlers::mip003;
use crate::state::AppState;

/// Routes mounted at `/mip003`.
///
/// ```text
/// GET    /availability                -> availability
/// GET    /{flow_key}/availability     -> flow_availability
/// GET    /{flow_key}/input_schema     -> input_schema
/// POST   /{flow_key}/start_job        -> start_job
/// GET    /{flow_key}/status           -> job_status
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/availability", get(mip003::availability))
        .route("/{flow_key}/availability", get(mip003::flow_availability))
        .route("/{flow_key}/input_schema", get(mip003::input_schema))
        .route("/{flow_key}/start_job", post(mip003::start_job))
        .route("/{flow_key}/status", get(mip003::job_status))
}
