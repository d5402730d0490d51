use axum::routing::post;
use axum::Router;

use crate::handlers::webhooks;
use crate::state::AppState;

/// Routes mounted at `/webhooks`.
///
/// ```text
/// POST   /masumi/payment   -> payment_notification
/// ```
pub fn router() -> Router<AppState> {
    Router::new().route("/masumi/payment", post(webhooks::payment_notification))
}
