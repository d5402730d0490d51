use axum::routing::get;
use axum::Router;

use crate::handlers::flows;
use crate::state::AppState;

/// Routes mounted at `/flows`.
///
/// ```text
/// GET    /                -> list_enabled_flows
/// ```
pub fn router() -> Router<AppState> {
    Router::new().route("/", get(flows::list_enabled_flows))
}
