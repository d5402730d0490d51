//! Payment loop: `pending_payment` records are confirmed and launched, or
//! expired once their pay-by deadline passes.

use chrono::Utc;
use flowgate_core::status::JobStatus;
use flowgate_db::models::job::{JobPatch, JobRecord};
use flowgate_masumi::PaymentStatus;
use futures::stream::{self, StreamExt};

use super::{Coordinator, CycleReport, JobError, Outcome};

impl Coordinator {
    /// One pass over every `pending_payment` record, followed by a sweep of
    /// orphaned `payment_confirmed` records.
    pub async fn run_payment_cycle(&self) -> CycleReport {
        let mut report = CycleReport::default();

        let mut pending = match self.select_all(&[JobStatus::PendingPayment]).await {
            Ok(jobs) => jobs,
            Err(e) => {
                tracing::error!(error = %e, "Failed to select pending payments");
                report.store_errors += 1;
                return report;
            }
        };
        // Nearest pay-by deadline first.
        pending.sort_by_key(|job| (job.pay_by_at.is_none(), job.pay_by_at));

        let results: Vec<_> = stream::iter(pending)
            .map(|job| self.advance_payment(job))
            .buffer_unordered(self.config.max_concurrent_checks)
            .collect()
            .await;
        for result in &results {
            report.record(result);
        }

        self.sweep_orphaned_confirmations(&mut report).await;
        report
    }

    /// Check one `pending_payment` record against the payment gateway and
    /// apply whatever transition follows.
    ///
    /// Also used by the confirmation webhook: the webhook only says which
    /// record to look at, the gateway is still asked for the real status.
    pub async fn advance_payment(&self, job: JobRecord) -> Result<Outcome, JobError> {
        if job.status != JobStatus::PendingPayment {
            return Err(JobError::Conflict {
                job_id: job.id,
                expected: JobStatus::PendingPayment,
            });
        }

        let Some(blockchain_identifier) = job.blockchain_identifier.clone() else {
            let err = JobError::Rejected("no payment request recorded for this job".into());
            self.fail(&job, &err).await?;
            return Ok(Outcome::Terminated);
        };

        let checked = self
            .call(
                "payment status check",
                self.payments.check_payment_status(&blockchain_identifier),
            )
            .await;

        match checked {
            Ok(PaymentStatus::Confirmed) => {
                let confirmed = self.transition(&job, JobPatch::payment_confirmed()).await?;
                tracing::info!(
                    job_id = %job.id,
                    blockchain_identifier = %blockchain_identifier,
                    "Payment confirmed",
                );
                match self.launch(confirmed).await {
                    Ok(_) => Ok(Outcome::Advanced),
                    Err(JobError::Rejected(_)) => Ok(Outcome::Terminated),
                    Err(e) => Err(e),
                }
            }
            Ok(PaymentStatus::Expired) => {
                self.expire(&job, "payment request expired at the payment processor")
                    .await
            }
            Ok(PaymentStatus::Unconfirmed) => {
                if self.pay_by_passed(&job) {
                    self.expire(&job, "pay-by deadline passed without payment").await
                } else {
                    Ok(Outcome::Waiting)
                }
            }
            Err(e) => {
                // The deadline applies even when the gateway is unreachable.
                if self.pay_by_passed(&job) {
                    self.expire(&job, "pay-by deadline passed without payment").await
                } else {
                    tracing::warn!(
                        job_id = %job.id,
                        blockchain_identifier = %blockchain_identifier,
                        error = %e,
                        "Payment status check failed, will retry",
                    );
                    Err(e)
                }
            }
        }
    }

    fn pay_by_passed(&self, job: &JobRecord) -> bool {
        job.pay_by_at.is_some_and(|deadline| Utc::now() > deadline)
    }

    async fn expire(&self, job: &JobRecord, reason: &str) -> Result<Outcome, JobError> {
        self.transition(job, JobPatch::payment_expired(reason)).await?;
        tracing::info!(job_id = %job.id, flow_key = %job.flow_key, reason, "Payment expired");
        Ok(Outcome::Terminated)
    }

    /// Fail records stuck in `payment_confirmed` past the launch grace
    /// period. Their launch outcome is unknown, so they are never launched
    /// again.
    async fn sweep_orphaned_confirmations(&self, report: &mut CycleReport) {
        let confirmed = match self.select_all(&[JobStatus::PaymentConfirmed]).await {
            Ok(jobs) => jobs,
            Err(e) => {
                tracing::error!(error = %e, "Failed to select confirmed payments");
                report.store_errors += 1;
                return;
            }
        };

        let grace = chrono::Duration::from_std(self.config.launch_grace)
            .unwrap_or_else(|_| chrono::Duration::seconds(300));
        let cutoff = Utc::now() - grace;

        for job in confirmed.into_iter().filter(|job| job.updated_at < cutoff) {
            let err = JobError::Rejected(
                "launch outcome unknown: record stayed in payment_confirmed past the launch grace period"
                    .into(),
            );
            let result = self.fail(&job, &err).await.map(|_| Outcome::Terminated);
            report.record(&result);
        }
    }
}
