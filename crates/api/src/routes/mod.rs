pub mod admin;
pub mod flows;
pub mod health;
pub mod jobs;
pub mod mip003;
pub mod webhooks;

use axum::Router;

use crate::state::AppState;

/// Build the application route tree.
///
/// ```text
/// /mip003/availability                      global availability
/// /mip003/{flow_key}/availability           per-flow availability
/// /mip003/{flow_key}/input_schema           discovered input schema
/// /mip003/{flow_key}/start_job              submit a job
/// /mip003/{flow_key}/status?job_id=         job status
///
/// /flows                                    enabled flows
/// /jobs/{id}                                job status
///
/// /admin/flows                              all flows
/// /admin/flows/reload                       rediscover flows
/// /admin/flows/{flow_key}/enable            enable with payment identifier
/// /admin/flows/{flow_key}/disable           disable
/// /admin/jobs                               list jobs (filters, pagination)
///
/// /webhooks/masumi/payment                  payment notification
/// ```
pub fn app_routes() -> Router<AppState> {
    Router::new()
        .nest("/mip003", mip003::router())
        .nest("/flows", flows::router())
        .nest("/jobs", jobs::router())
        .nest("/admin", admin::router())
        .nest("/webhooks", webhooks::router())
}
