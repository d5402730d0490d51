//! Lifecycle coordinator.
//!
//! Two recurring loops advance job records:
//!
//! - the payment loop ([`Coordinator::run_payment_cycle`]) confirms or
//!   expires `pending_payment` records and launches paid ones;
//! - the execution loop ([`Coordinator::run_execution_cycle`]) follows
//!   `starting` / `running` records until the engine reports a terminal
//!   state or the submit-by deadline passes.
//!
//! Every write is a compare-and-swap against the status the record was read
//! in, so overlapping cycles (or the webhook path) never apply a transition
//! twice. Each cycle can be driven directly from tests.

mod execution;
mod payment;

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use flowgate_db::models::job::{JobPatch, JobRecord};
use flowgate_db::{JobStore, StoreError};
use flowgate_events::{EventBus, JobEvent};
use flowgate_kodosumi::ExecutionEngine;
use flowgate_masumi::PaymentGateway;
use flowgate_core::status::JobStatus;
use flowgate_core::types::JobId;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use crate::config::CoordinatorConfig;

/// Why processing a single job stopped short.
///
/// `Rejected` and `DeadlineExceeded` are written into the record's error
/// detail; `Transport` and `Conflict` leave the record untouched.
#[derive(Debug, thiserror::Error)]
pub enum JobError {
    /// Retryable: the remote call failed or timed out.
    #[error("transport error: {0}")]
    Transport(String),

    /// The remote system refused the request.
    #[error("{0}")]
    Rejected(String),

    #[error("{0}")]
    DeadlineExceeded(String),

    /// The record was no longer in the expected status; another writer won.
    #[error("job {job_id} is no longer {expected}")]
    Conflict { job_id: JobId, expected: JobStatus },

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Result of processing one job within a cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// Moved forward on the success path.
    Advanced,
    /// Moved to `failed` or `payment_expired`.
    Terminated,
    /// Nothing to do yet.
    Waiting,
}

/// Per-cycle tally logged by the loops and returned to tests.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct CycleReport {
    pub examined: usize,
    pub advanced: usize,
    pub terminated: usize,
    pub waiting: usize,
    pub conflicts: usize,
    pub transport_errors: usize,
    pub store_errors: usize,
}

impl CycleReport {
    pub(crate) fn record(&mut self, result: &Result<Outcome, JobError>) {
        self.examined += 1;
        match result {
            Ok(Outcome::Advanced) => self.advanced += 1,
            Ok(Outcome::Terminated) => self.terminated += 1,
            Ok(Outcome::Waiting) => self.waiting += 1,
            Err(JobError::Conflict { .. }) => self.conflicts += 1,
            Err(JobError::Transport(_)) => self.transport_errors += 1,
            Err(JobError::Rejected(_) | JobError::DeadlineExceeded(_)) => self.terminated += 1,
            Err(JobError::Store(_)) => self.store_errors += 1,
        }
    }

    /// Whether any record changed status.
    pub fn changed_anything(&self) -> bool {
        self.advanced + self.terminated > 0
    }

    fn log(&self, cycle: &'static str) {
        if self.changed_anything() || self.store_errors > 0 {
            tracing::info!(
                cycle,
                examined = self.examined,
                advanced = self.advanced,
                terminated = self.terminated,
                waiting = self.waiting,
                conflicts = self.conflicts,
                transport_errors = self.transport_errors,
                store_errors = self.store_errors,
                "Cycle finished",
            );
        } else {
            tracing::debug!(
                cycle,
                examined = self.examined,
                waiting = self.waiting,
                transport_errors = self.transport_errors,
                "Cycle finished",
            );
        }
    }
}

/// Drives job records through their lifecycle.
pub struct Coordinator {
    store: Arc<dyn JobStore>,
    payments: Arc<dyn PaymentGateway>,
    engine: Arc<dyn ExecutionEngine>,
    events: Arc<EventBus>,
    config: CoordinatorConfig,
}

impl Coordinator {
    pub fn new(
        store: Arc<dyn JobStore>,
        payments: Arc<dyn PaymentGateway>,
        engine: Arc<dyn ExecutionEngine>,
        events: Arc<EventBus>,
        config: CoordinatorConfig,
    ) -> Self {
        Self {
            store,
            payments,
            engine,
            events,
            config,
        }
    }

    pub fn config(&self) -> &CoordinatorConfig {
        &self.config
    }

    /// Run the payment loop until `cancel` fires. A cycle already in
    /// progress completes before the loop exits.
    pub async fn run_payment_loop(&self, cancel: CancellationToken) {
        self.run_loop("payment", self.config.payment_poll_interval, cancel, || {
            self.run_payment_cycle()
        })
        .await;
    }

    /// Run the execution loop until `cancel` fires.
    pub async fn run_execution_loop(&self, cancel: CancellationToken) {
        self.run_loop("execution", self.config.execution_poll_interval, cancel, || {
            self.run_execution_cycle()
        })
        .await;
    }

    async fn run_loop<'a, F, Fut>(
        &'a self,
        name: &'static str,
        period: Duration,
        cancel: CancellationToken,
        cycle: F,
    ) where
        F: Fn() -> Fut,
        Fut: Future<Output = CycleReport> + 'a,
    {
        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        tracing::info!(loop_name = name, interval_secs = period.as_secs(), "Polling loop started");

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    tracing::info!(loop_name = name, "Polling loop shutting down");
                    break;
                }
                _ = ticker.tick() => {
                    cycle().await.log(name);
                }
            }
        }
    }

    /// Every record in one of `statuses`, read page by page.
    async fn select_all(&self, statuses: &[JobStatus]) -> Result<Vec<JobRecord>, StoreError> {
        let page_size = self.config.page_size.max(1);
        let mut selected = Vec::new();
        let mut after = None;

        loop {
            let page = self.store.list_by_status(statuses, after, page_size).await?;
            let last_page = i64::try_from(page.len()).unwrap_or(i64::MAX) < page_size;
            after = page.last().map(|job| (job.created_at, job.id));
            selected.extend(page);
            if last_page || after.is_none() {
                return Ok(selected);
            }
        }
    }

    /// Wrap a remote call in the per-call timeout; a timeout is reported
    /// like any other transport failure.
    async fn call<T, E, Fut>(&self, what: &str, fut: Fut) -> Result<T, JobError>
    where
        E: std::fmt::Display,
        Fut: Future<Output = Result<T, E>>,
    {
        match tokio::time::timeout(self.config.call_timeout, fut).await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(e)) => Err(JobError::Transport(format!("{what}: {e}"))),
            Err(_) => Err(JobError::Transport(format!(
                "{what}: timed out after {}s",
                self.config.call_timeout.as_secs()
            ))),
        }
    }

    /// Compare-and-swap `job` from its current status, publishing the
    /// transition on success.
    async fn transition(&self, job: &JobRecord, patch: JobPatch) -> Result<JobRecord, JobError> {
        let updated = self
            .store
            .compare_and_set(job.id, job.status, patch)
            .await?
            .ok_or(JobError::Conflict {
                job_id: job.id,
                expected: job.status,
            })?;

        if updated.status != job.status {
            let mut event =
                JobEvent::transition(updated.id, &updated.flow_key, job.status, updated.status);
            if let Some(detail) = &updated.error_message {
                event = event.with_detail(detail);
            }
            self.events.publish(event);
        }
        Ok(updated)
    }

    /// Move `job` to `failed` with `err` as the error detail.
    async fn fail(&self, job: &JobRecord, err: &JobError) -> Result<JobRecord, JobError> {
        let updated = self.transition(job, JobPatch::failed(err.to_string())).await?;
        tracing::error!(
            job_id = %job.id,
            flow_key = %job.flow_key,
            from = %job.status,
            error = %err,
            "Job failed",
        );
        Ok(updated)
    }

    /// Launch a `payment_confirmed` record on the engine.
    ///
    /// On success the record moves to `starting` with the remote run id. Any
    /// launch failure (including a timeout) is terminal: the payment has been
    /// taken, so the record moves to `failed` and is never launched again.
    pub async fn launch(&self, job: JobRecord) -> Result<JobRecord, JobError> {
        if job.status != JobStatus::PaymentConfirmed {
            return Err(JobError::Conflict {
                job_id: job.id,
                expected: JobStatus::PaymentConfirmed,
            });
        }

        let launched = self
            .call("engine launch", self.engine.launch(&job.flow_path, &job.input_data))
            .await;

        match launched {
            Ok(run_id) => {
                let updated = self
                    .transition(&job, JobPatch::starting(run_id.clone()))
                    .await
                    .inspect_err(|e| {
                        tracing::warn!(
                            job_id = %job.id,
                            remote_run_id = %run_id,
                            error = %e,
                            "Remote run started but the record could not be moved to starting",
                        );
                    })?;
                tracing::info!(
                    job_id = %job.id,
                    flow_key = %job.flow_key,
                    remote_run_id = %run_id,
                    "Job launched",
                );
                Ok(updated)
            }
            Err(e) => {
                let reason = match e {
                    JobError::Transport(message) => message,
                    other => other.to_string(),
                };
                let err = JobError::Rejected(format!("launch failed: {reason}"));
                self.fail(&job, &err).await?;
                Err(err)
            }
        }
    }
}
