//! Entry points used by the HTTP layer: job submission, status lookup,
//! admin listing and the payment confirmation webhook.

use std::sync::Arc;

use chrono::Utc;
use flowgate_core::hashing::input_hash;
use flowgate_core::status::JobStatus;
use flowgate_core::types::{Amount, JobId, Payload};
use flowgate_db::models::job::{JobListQuery, JobRecord, NewJob};
use flowgate_db::{JobStore, StoreError};
use flowgate_events::{EventBus, JobEvent};
use flowgate_masumi::{PaymentGateway, PaymentTerms};
use uuid::Uuid;

use crate::coordinator::{Coordinator, JobError};
use crate::registry::FlowRegistry;

/// Errors surfaced to callers of [`JobService`].
#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    /// The flow is unknown, disabled, or has no payment identifier.
    #[error("flow `{0}` is not available")]
    FlowNotConfigured(String),

    #[error("job {0} not found")]
    NotFound(JobId),

    #[error("{0}")]
    Validation(String),

    /// The payment processor refused or could not be reached. No job
    /// record was created.
    #[error("payment request failed: {0}")]
    PaymentRequest(String),

    /// An unpaid job was created but its launch failed; the record is
    /// `failed`.
    #[error("job {job_id} could not be launched: {reason}")]
    Launch { job_id: JobId, reason: String },

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// A submission request.
#[derive(Debug, Clone)]
pub struct SubmitJob {
    pub flow_key: String,
    pub identifier_from_purchaser: String,
    pub input: Payload,
    pub amount: Amount,
    pub payment_unit: String,
}

pub struct JobService {
    store: Arc<dyn JobStore>,
    payments: Arc<dyn PaymentGateway>,
    registry: Arc<FlowRegistry>,
    coordinator: Arc<Coordinator>,
    events: Arc<EventBus>,
}

impl JobService {
    pub fn new(
        store: Arc<dyn JobStore>,
        payments: Arc<dyn PaymentGateway>,
        registry: Arc<FlowRegistry>,
        coordinator: Arc<Coordinator>,
        events: Arc<EventBus>,
    ) -> Self {
        Self {
            store,
            payments,
            registry,
            coordinator,
            events,
        }
    }

    /// Create a job for an enabled flow.
    ///
    /// Paid jobs get a payment request and start in `pending_payment`.
    /// When unpaid jobs are allowed, a zero amount skips payment: the record
    /// starts in `payment_confirmed` and is launched before returning.
    /// Every call creates an independent record, even for a purchaser
    /// identifier seen before.
    pub async fn submit(&self, request: SubmitJob) -> Result<JobRecord, ServiceError> {
        let flow = self
            .registry
            .get(&request.flow_key)
            .filter(|f| f.is_active())
            .ok_or_else(|| ServiceError::FlowNotConfigured(request.flow_key.clone()))?;
        let Some(agent_identifier) = flow.agent_identifier.clone() else {
            return Err(ServiceError::FlowNotConfigured(request.flow_key));
        };

        let purchaser = request.identifier_from_purchaser.trim();
        if purchaser.is_empty() {
            return Err(ServiceError::Validation(
                "identifier_from_purchaser must not be empty".into(),
            ));
        }

        let config = self.coordinator.config();
        let unpaid = request.amount == 0 && config.allow_unpaid_jobs;
        if request.amount <= 0 && !unpaid {
            return Err(ServiceError::Validation("amount must be positive".into()));
        }

        let hash = input_hash(&request.input);
        let mut job = NewJob {
            id: Uuid::now_v7(),
            flow_key: flow.key.clone(),
            flow_path: flow.path.clone(),
            identifier_from_purchaser: purchaser.to_string(),
            status: JobStatus::PendingPayment,
            amount: request.amount,
            payment_unit: request.payment_unit,
            agent_identifier: Some(agent_identifier.clone()),
            blockchain_identifier: None,
            input_hash: hash.clone(),
            pay_by_at: None,
            submit_by_at: None,
            unlock_at: None,
            external_dispute_unlock_at: None,
            input_data: request.input,
        };

        if unpaid {
            let window = chrono::Duration::from_std(config.unpaid_submit_window)
                .unwrap_or_else(|_| chrono::Duration::days(1));
            job.status = JobStatus::PaymentConfirmed;
            job.submit_by_at = Some(Utc::now() + window);
            return self.submit_unpaid(job).await;
        }

        let terms = PaymentTerms {
            agent_identifier,
            amount: job.amount,
            unit: job.payment_unit.clone(),
            identifier_from_purchaser: job.identifier_from_purchaser.clone(),
            input_hash: hash,
        };
        let payment = match tokio::time::timeout(config.call_timeout, self.payments.request_payment(&terms)).await {
            Ok(Ok(payment)) => payment,
            Ok(Err(e)) => return Err(ServiceError::PaymentRequest(e.to_string())),
            Err(_) => {
                return Err(ServiceError::PaymentRequest(format!(
                    "timed out after {}s",
                    config.call_timeout.as_secs()
                )))
            }
        };

        job.blockchain_identifier = Some(payment.blockchain_identifier);
        job.pay_by_at = Some(payment.pay_by);
        job.submit_by_at = Some(payment.submit_by);
        job.unlock_at = Some(payment.unlock_at);
        job.external_dispute_unlock_at = Some(payment.external_dispute_unlock_at);

        let record = self.insert(job).await?;
        tracing::info!(
            job_id = %record.id,
            flow_key = %record.flow_key,
            blockchain_identifier = record.blockchain_identifier.as_deref().unwrap_or(""),
            "Job created, awaiting payment",
        );
        Ok(record)
    }

    async fn submit_unpaid(&self, job: NewJob) -> Result<JobRecord, ServiceError> {
        let record = self.insert(job).await?;
        tracing::info!(job_id = %record.id, flow_key = %record.flow_key, "Unpaid job created");

        match self.coordinator.launch(record.clone()).await {
            Ok(launched) => Ok(launched),
            Err(JobError::Rejected(reason)) => Err(ServiceError::Launch {
                job_id: record.id,
                reason,
            }),
            Err(JobError::Store(e)) => Err(e.into()),
            // Someone else already moved the record; report what is stored.
            Err(_) => self.get(record.id).await,
        }
    }

    async fn insert(&self, job: NewJob) -> Result<JobRecord, ServiceError> {
        let record = self.store.insert(job).await?;
        self.events
            .publish(JobEvent::created(record.id, &record.flow_key, record.status));
        Ok(record)
    }

    pub async fn get(&self, job_id: JobId) -> Result<JobRecord, ServiceError> {
        self.store
            .find(job_id)
            .await?
            .ok_or(ServiceError::NotFound(job_id))
    }

    pub async fn list(&self, query: &JobListQuery) -> Result<Vec<JobRecord>, ServiceError> {
        Ok(self.store.list(query).await?)
    }

    /// Handle a payment notification for `blockchain_identifier`.
    ///
    /// The notification only selects the record; the payment gateway is
    /// asked for the real status and the same conditional transition as the
    /// payment loop is applied. Unknown identifiers are ignored. Returns the
    /// record as stored afterwards.
    pub async fn confirm_payment(
        &self,
        blockchain_identifier: &str,
    ) -> Result<Option<JobRecord>, ServiceError> {
        let Some(job) = self
            .store
            .find_by_blockchain_identifier(blockchain_identifier)
            .await?
        else {
            tracing::warn!(blockchain_identifier, "Payment notification for unknown payment request");
            return Ok(None);
        };

        if job.status != JobStatus::PendingPayment {
            tracing::debug!(job_id = %job.id, status = %job.status, "Payment notification for job not awaiting payment");
            return Ok(Some(job));
        }

        let job_id = job.id;
        match self.coordinator.advance_payment(job).await {
            Ok(outcome) => {
                tracing::info!(job_id = %job_id, ?outcome, "Payment notification processed");
            }
            Err(JobError::Store(e)) => return Err(e.into()),
            Err(e) => {
                tracing::warn!(job_id = %job_id, error = %e, "Payment notification left job unchanged");
            }
        }
        Ok(self.store.find(job_id).await?)
    }
}
