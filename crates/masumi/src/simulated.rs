//! Gateway that fakes the payment processor.
//!
//! Every request is confirmed once `confirm_after` has elapsed since it was
//! created. Request ids look like `test_block_<12 hex>` so they are easy to
//! spot in the store.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{Duration as ChronoDuration, Utc};
use tokio::time::Instant;

use crate::error::PaymentError;
use crate::gateway::{PaymentGateway, PaymentRequest, PaymentStatus, PaymentTerms};

pub struct SimulatedPaymentGateway {
    confirm_after: Duration,
    requested_at: Mutex<HashMap<String, Instant>>,
}

impl SimulatedPaymentGateway {
    pub fn new(confirm_after: Duration) -> Self {
        Self {
            confirm_after,
            requested_at: Mutex::new(HashMap::new()),
        }
    }
}

#[async_trait]
impl PaymentGateway for SimulatedPaymentGateway {
    async fn request_payment(&self, terms: &PaymentTerms) -> Result<PaymentRequest, PaymentError> {
        let simple = uuid::Uuid::new_v4().simple().to_string();
        let blockchain_identifier = format!("test_block_{}", &simple[..12]);
        let now = Utc::now();

        self.requested_at
            .lock()
            .map_err(|_| PaymentError::Malformed("simulated gateway lock poisoned".into()))?
            .insert(blockchain_identifier.clone(), Instant::now());

        tracing::info!(
            blockchain_identifier = %blockchain_identifier,
            identifier_from_purchaser = %terms.identifier_from_purchaser,
            "Simulated payment request created",
        );

        Ok(PaymentRequest {
            blockchain_identifier,
            pay_by: now + ChronoDuration::hours(12),
            submit_by: now + ChronoDuration::hours(24),
            unlock_at: now + ChronoDuration::hours(48),
            external_dispute_unlock_at: now + ChronoDuration::hours(72),
        })
    }

    async fn check_payment_status(
        &self,
        blockchain_identifier: &str,
    ) -> Result<PaymentStatus, PaymentError> {
        let requested_at = self
            .requested_at
            .lock()
            .map_err(|_| PaymentError::Malformed("simulated gateway lock poisoned".into()))?
            .get(blockchain_identifier)
            .copied();

        // Requests made before a restart are unknown here; treat them as paid.
        let status = match requested_at {
            Some(at) if at.elapsed() < self.confirm_after => PaymentStatus::Unconfirmed,
            _ => PaymentStatus::Confirmed,
        };
        Ok(status)
    }

    async fn submit_result(
        &self,
        blockchain_identifier: &str,
        result_hash: &str,
    ) -> Result<(), PaymentError> {
        tracing::info!(
            blockchain_identifier = %blockchain_identifier,
            result_hash = %result_hash,
            "Simulated result submission",
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn terms() -> PaymentTerms {
        PaymentTerms {
            agent_identifier: "agent-1".into(),
            amount: 10_000_000,
            unit: "lovelace".into(),
            identifier_from_purchaser: "buyer-1".into(),
            input_hash: "abc".into(),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn confirms_after_delay() {
        let gateway = SimulatedPaymentGateway::new(Duration::from_secs(5));
        let request = gateway.request_payment(&terms()).await.unwrap();

        assert!(request.blockchain_identifier.starts_with("test_block_"));
        assert_eq!(request.blockchain_identifier.len(), "test_block_".len() + 12);
        assert!(request.pay_by < request.submit_by);

        let status = gateway
            .check_payment_status(&request.blockchain_identifier)
            .await
            .unwrap();
        assert_eq!(status, PaymentStatus::Unconfirmed);

        tokio::time::advance(Duration::from_secs(6)).await;

        let status = gateway
            .check_payment_status(&request.blockchain_identifier)
            .await
            .unwrap();
        assert_eq!(status, PaymentStatus::Confirmed);
    }

    #[tokio::test]
    async fn unknown_identifiers_are_confirmed() {
        let gateway = SimulatedPaymentGateway::new(Duration::from_secs(5));
        let status = gateway.check_payment_status("test_block_unknown").await.unwrap();
        assert_eq!(status, PaymentStatus::Confirmed);
    }
}
