//! Execution loop: `starting` / `running` records are followed on the
//! engine until they finish, fail, or run past their submit-by deadline.

use chrono::Utc;
use flowgate_core::hashing::{result_hash, result_text};
use flowgate_core::status::JobStatus;
use flowgate_db::models::job::{JobPatch, JobRecord};
use flowgate_kodosumi::{RunState, RunStatus};
use futures::stream::{self, StreamExt};

use super::{Coordinator, CycleReport, JobError, Outcome};

impl Coordinator {
    /// One pass over every launched, non-terminal record.
    pub async fn run_execution_cycle(&self) -> CycleReport {
        let mut report = CycleReport::default();

        let mut active = match self
            .select_all(&[JobStatus::Starting, JobStatus::Running])
            .await
        {
            Ok(jobs) => jobs,
            Err(e) => {
                tracing::error!(error = %e, "Failed to select running jobs");
                report.store_errors += 1;
                return report;
            }
        };
        // Nearest submit-by deadline first.
        active.sort_by_key(|job| (job.submit_by_at.is_none(), job.submit_by_at));

        let results: Vec<_> = stream::iter(active)
            .map(|job| self.advance_execution(job))
            .buffer_unordered(self.config.max_concurrent_checks)
            .collect()
            .await;
        for result in &results {
            report.record(result);
        }
        report
    }

    async fn advance_execution(&self, job: JobRecord) -> Result<Outcome, JobError> {
        if let Some(deadline) = job.submit_by_at {
            if Utc::now() > deadline {
                let err = JobError::DeadlineExceeded(format!(
                    "timed out: no result before the submit-by deadline {}",
                    deadline.to_rfc3339()
                ));
                self.fail(&job, &err).await?;
                return Ok(Outcome::Terminated);
            }
        }

        let Some(run_id) = job.remote_run_id.clone() else {
            let err = JobError::Rejected("launched job has no remote run id".into());
            self.fail(&job, &err).await?;
            return Ok(Outcome::Terminated);
        };

        let status = self
            .call("engine status", self.engine.get_status(&run_id))
            .await
            .inspect_err(|e| {
                tracing::warn!(job_id = %job.id, remote_run_id = %run_id, error = %e, "Status check failed, will retry");
            })?;

        match &status.state {
            RunState::Starting | RunState::Running => self.observe(job, &status).await,
            RunState::Finished => self.complete(job, &run_id, &status).await,
            RunState::Failed { reason } => {
                let err = JobError::Rejected(format!("remote run failed: {reason}"));
                self.transition(
                    &job,
                    JobPatch::failed(err.to_string()).with_remote_status(&status.remote_status),
                )
                .await?;
                tracing::error!(job_id = %job.id, remote_run_id = %run_id, error = %err, "Job failed");
                Ok(Outcome::Terminated)
            }
        }
    }

    /// Record progress: `starting -> running` once the run shows signs of
    /// work, otherwise just remember the latest remote status.
    async fn observe(&self, job: JobRecord, status: &RunStatus) -> Result<Outcome, JobError> {
        if job.status == JobStatus::Starting && status.has_progress() {
            self.transition(&job, JobPatch::running().with_remote_status(&status.remote_status))
                .await?;
            return Ok(Outcome::Advanced);
        }

        if job.remote_status.as_deref() != Some(status.remote_status.as_str()) {
            self.transition(&job, JobPatch::observed(job.status, &status.remote_status))
                .await?;
        }
        Ok(Outcome::Waiting)
    }

    /// Fetch the result of a finished run and complete the record.
    async fn complete(
        &self,
        job: JobRecord,
        run_id: &str,
        status: &RunStatus,
    ) -> Result<Outcome, JobError> {
        let result = self
            .call("engine result", self.engine.get_result(run_id))
            .await
            .inspect_err(|e| {
                tracing::warn!(job_id = %job.id, remote_run_id = %run_id, error = %e, "Result fetch failed, will retry");
            })?;

        // `completed` is only reachable from `running`.
        let job = if job.status == JobStatus::Starting {
            self.transition(&job, JobPatch::running()).await?
        } else {
            job
        };

        let hash = result_hash(&result_text(&result), &job.identifier_from_purchaser);
        let completed = self
            .transition(
                &job,
                JobPatch::completed(result, hash.clone()).with_remote_status(&status.remote_status),
            )
            .await?;
        tracing::info!(job_id = %job.id, flow_key = %job.flow_key, "Job completed");

        self.report_result(&completed, &hash).await;
        Ok(Outcome::Advanced)
    }

    /// Best-effort result submission to the payment processor.
    async fn report_result(&self, job: &JobRecord, hash: &str) {
        let Some(blockchain_identifier) = job.blockchain_identifier.as_deref() else {
            return;
        };

        match self
            .call(
                "result submission",
                self.payments.submit_result(blockchain_identifier, hash),
            )
            .await
        {
            Ok(()) => {
                tracing::info!(job_id = %job.id, blockchain_identifier, "Result submitted for payment");
            }
            Err(e) => {
                tracing::warn!(
                    job_id = %job.id,
                    blockchain_identifier,
                    error = %e,
                    "Result submission failed; job stays completed",
                );
            }
        }
    }
}
