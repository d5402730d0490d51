//! The payment gateway seam.

use async_trait::async_trait;
use flowgate_core::types::{Amount, Timestamp};
use serde::Serialize;

use crate::error::PaymentError;

/// What a purchaser is asked to pay for one job.
#[derive(Debug, Clone)]
pub struct PaymentTerms {
    /// Identifier the payment processor knows the flow's agent by.
    pub agent_identifier: String,
    pub amount: Amount,
    pub unit: String,
    pub identifier_from_purchaser: String,
    /// SHA-256 of the job input, committed to with the payment request.
    pub input_hash: String,
}

/// A payment request accepted by the processor.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PaymentRequest {
    pub blockchain_identifier: String,
    pub pay_by: Timestamp,
    pub submit_by: Timestamp,
    pub unlock_at: Timestamp,
    pub external_dispute_unlock_at: Timestamp,
}

/// Confirmation state of a payment request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    Unconfirmed,
    Confirmed,
    Expired,
}

/// Client for the external payment processor.
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Create a payment request. Never retried automatically: a second
    /// request could charge the purchaser twice.
    async fn request_payment(&self, terms: &PaymentTerms) -> Result<PaymentRequest, PaymentError>;

    /// Read-only status check; safe to repeat.
    async fn check_payment_status(
        &self,
        blockchain_identifier: &str,
    ) -> Result<PaymentStatus, PaymentError>;

    /// Report the hash of a completed job's result so the seller can
    /// collect the locked funds.
    async fn submit_result(
        &self,
        blockchain_identifier: &str,
        result_hash: &str,
    ) -> Result<(), PaymentError>;
}
