//! Inbound notifications from the payment processor.
//!
//! A notification only names a payment request. The job service asks the
//! payment gateway for the actual status before changing anything.

use axum::extract::State;
use axum::response::IntoResponse;
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::error::{AppError, AppResult};
use crate::handlers::jobs::JobView;
use crate::response::DataResponse;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct PaymentNotification {
    #[serde(alias = "blockchainIdentifier")]
    pub blockchain_identifier: String,
}

#[derive(Debug, Serialize)]
pub struct NotificationResult {
    /// Whether a matching job was found.
    pub processed: bool,
    pub job: Option<JobView>,
}

/// POST /webhooks/masumi/payment
///
/// Unknown identifiers are acknowledged with `processed: false`.
pub async fn payment_notification(
    State(state): State<AppState>,
    Json(input): Json<PaymentNotification>,
) -> AppResult<impl IntoResponse> {
    let blockchain_identifier = input.blockchain_identifier.trim();
    if blockchain_identifier.is_empty() {
        return Err(AppError::BadRequest(
            "blockchain_identifier must not be empty".into(),
        ));
    }

    let job = state.jobs.confirm_payment(blockchain_identifier).await?;
    Ok(Json(DataResponse {
        data: NotificationResult {
            processed: job.is_some(),
            job: job.map(JobView::from),
        },
    }))
}
