//! REST client for a Masumi payment service node.
//!
//! Wraps the `/payment` endpoints (request creation, on-chain state lookup,
//! result submission) using [`reqwest`]. Every call authenticates with the
//! `token` header.

use async_trait::async_trait;
use chrono::{DateTime, Duration as ChronoDuration, TimeZone, Utc};
use flowgate_core::types::Timestamp;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::config::MasumiConfig;
use crate::error::PaymentError;
use crate::gateway::{PaymentGateway, PaymentRequest, PaymentStatus, PaymentTerms};

/// Payment window requested from the service.
const PAY_BY_WINDOW_HOURS: i64 = 12;
/// Result submission window requested from the service.
const SUBMIT_RESULT_WINDOW_HOURS: i64 = 24;

/// HTTP client for a single payment service node.
pub struct MasumiApi {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    network: String,
}

/// `{ "status": "success", "data": { ... } }` envelope used by the service.
#[derive(Debug, Deserialize)]
struct Envelope<T> {
    data: T,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreatedPayment {
    blockchain_identifier: String,
    pay_by_time: Value,
    submit_result_time: Value,
    unlock_time: Value,
    external_dispute_unlock_time: Value,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ResolvedPayment {
    on_chain_state: Option<String>,
}

impl MasumiApi {
    pub fn new(config: &MasumiConfig) -> Self {
        Self::with_client(reqwest::Client::new(), config)
    }

    /// Reuse an existing [`reqwest::Client`] (shared connection pool).
    pub fn with_client(client: reqwest::Client, config: &MasumiConfig) -> Self {
        Self {
            client,
            base_url: config.service_url.clone(),
            api_key: config.api_key.clone(),
            network: config.network.clone(),
        }
    }

    async fn post<T: serde::de::DeserializeOwned>(
        &self,
        path: &str,
        body: &Value,
    ) -> Result<T, PaymentError> {
        let response = self
            .client
            .post(format!("{}{}", self.base_url, path))
            .header("token", &self.api_key)
            .json(body)
            .send()
            .await?;

        Self::parse_response(response).await
    }

    // ---- private helpers ----

    /// Return the response unchanged on 2xx, or [`PaymentError::Rejected`]
    /// with the status and body text.
    async fn ensure_success(
        response: reqwest::Response,
    ) -> Result<reqwest::Response, PaymentError> {
        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<unreadable body>".to_string());
            return Err(PaymentError::Rejected {
                status: status.as_u16(),
                body,
            });
        }
        Ok(response)
    }

    async fn parse_response<T: serde::de::DeserializeOwned>(
        response: reqwest::Response,
    ) -> Result<T, PaymentError> {
        let response = Self::ensure_success(response).await?;
        let body: Value = response.json().await?;
        serde_json::from_value(body).map_err(|e| PaymentError::Malformed(e.to_string()))
    }
}

#[async_trait]
impl PaymentGateway for MasumiApi {
    async fn request_payment(&self, terms: &PaymentTerms) -> Result<PaymentRequest, PaymentError> {
        let now = Utc::now();
        let body = json!({
            "agentIdentifier": terms.agent_identifier,
            "network": self.network,
            "inputHash": terms.input_hash,
            "identifierFromPurchaser": terms.identifier_from_purchaser,
            "paymentType": "Web3CardanoV1",
            "payByTime": (now + ChronoDuration::hours(PAY_BY_WINDOW_HOURS)).to_rfc3339(),
            "submitResultTime": (now + ChronoDuration::hours(SUBMIT_RESULT_WINDOW_HOURS)).to_rfc3339(),
            "RequestedFunds": [{ "amount": terms.amount.to_string(), "unit": terms.unit }],
        });

        let created: Envelope<CreatedPayment> = self.post("/payment/", &body).await?;
        let request = created.data.into_request()?;

        tracing::info!(
            blockchain_identifier = %request.blockchain_identifier,
            agent_identifier = %terms.agent_identifier,
            pay_by = %request.pay_by,
            "Payment request created",
        );
        Ok(request)
    }

    async fn check_payment_status(
        &self,
        blockchain_identifier: &str,
    ) -> Result<PaymentStatus, PaymentError> {
        let body = json!({
            "blockchainIdentifier": blockchain_identifier,
            "network": self.network,
            "includeHistory": false,
        });

        let resolved: Envelope<ResolvedPayment> = self
            .post("/payment/resolve-blockchain-identifier", &body)
            .await?;
        status_from_on_chain_state(resolved.data.on_chain_state.as_deref())
    }

    async fn submit_result(
        &self,
        blockchain_identifier: &str,
        result_hash: &str,
    ) -> Result<(), PaymentError> {
        let body = json!({
            "network": self.network,
            "blockchainIdentifier": blockchain_identifier,
            "submitResultHash": result_hash,
        });

        let _: Value = self.post("/payment/submit-result", &body).await?;
        Ok(())
    }
}

impl CreatedPayment {
    fn into_request(self) -> Result<PaymentRequest, PaymentError> {
        Ok(PaymentRequest {
            pay_by: parse_timestamp(&self.pay_by_time)?,
            submit_by: parse_timestamp(&self.submit_result_time)?,
            unlock_at: parse_timestamp(&self.unlock_time)?,
            external_dispute_unlock_at: parse_timestamp(&self.external_dispute_unlock_time)?,
            blockchain_identifier: self.blockchain_identifier,
        })
    }
}

/// Map the service's on-chain state to a confirmation status.
///
/// No state yet means the purchaser has not paid.
pub(crate) fn status_from_on_chain_state(state: Option<&str>) -> Result<PaymentStatus, PaymentError> {
    match state {
        None => Ok(PaymentStatus::Unconfirmed),
        Some(
            "FundsLocked" | "ResultSubmitted" | "Withdrawn" | "RefundRequested" | "Disputed",
        ) => Ok(PaymentStatus::Confirmed),
        Some("FundsOrDatumInvalid" | "RefundWithdrawn" | "DisputedWithdrawn") => {
            Ok(PaymentStatus::Expired)
        }
        Some(other) => Err(PaymentError::Malformed(format!(
            "unknown onChainState `{other}`"
        ))),
    }
}

/// Accept epoch seconds, epoch milliseconds (as number or string) and
/// RFC 3339 strings.
pub(crate) fn parse_timestamp(value: &Value) -> Result<Timestamp, PaymentError> {
    let malformed = || PaymentError::Malformed(format!("invalid timestamp {value}"));

    let epoch = match value {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => match s.parse::<i64>() {
            Ok(n) => Some(n),
            Err(_) => {
                return DateTime::parse_from_rfc3339(s)
                    .map(|t| t.with_timezone(&Utc))
                    .map_err(|_| malformed());
            }
        },
        _ => None,
    }
    .ok_or_else(malformed)?;

    let parsed = if epoch > 1_000_000_000_000 {
        Utc.timestamp_millis_opt(epoch)
    } else {
        Utc.timestamp_opt(epoch, 0)
    };
    parsed.single().ok_or_else(malformed)
}
