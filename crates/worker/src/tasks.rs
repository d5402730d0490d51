//! Supervisor for the recurring tasks.
//!
//! Spawns the payment poller, the execution poller, the flow refresher and
//! the transition log as named tasks sharing one cancellation token.
//! [`BackgroundTasks::shutdown`] cancels them and waits for each in turn;
//! a cycle in progress finishes (its calls are bounded by the per-call
//! timeout) before the task exits.

use std::sync::Arc;
use std::time::Duration;

use flowgate_events::{EventBus, TransitionLog};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::coordinator::Coordinator;
use crate::registry::FlowRegistry;

pub struct BackgroundTasks {
    cancel: CancellationToken,
    handles: Vec<(&'static str, JoinHandle<()>)>,
}

impl BackgroundTasks {
    pub fn spawn(
        coordinator: Arc<Coordinator>,
        registry: Arc<FlowRegistry>,
        events: &EventBus,
    ) -> Self {
        let cancel = CancellationToken::new();
        let refresh_interval = coordinator.config().flow_refresh_interval;
        let mut handles = Vec::with_capacity(4);

        let c = Arc::clone(&coordinator);
        let token = cancel.clone();
        handles.push((
            "payment-poller",
            tokio::spawn(async move { c.run_payment_loop(token).await }),
        ));

        let c = Arc::clone(&coordinator);
        let token = cancel.clone();
        handles.push((
            "execution-poller",
            tokio::spawn(async move { c.run_execution_loop(token).await }),
        ));

        let token = cancel.clone();
        handles.push((
            "flow-refresher",
            tokio::spawn(async move { registry.run_refresh_loop(refresh_interval, token).await }),
        ));

        handles.push((
            "transition-log",
            tokio::spawn(TransitionLog::run(events.subscribe(), cancel.clone())),
        ));

        tracing::info!(tasks = handles.len(), "Background tasks started");
        Self { cancel, handles }
    }

    /// Token shared by every task; cancelling it stops them all.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Cancel all tasks and wait up to `grace` for each.
    pub async fn shutdown(self, grace: Duration) {
        self.cancel.cancel();
        for (name, handle) in self.handles {
            match tokio::time::timeout(grace, handle).await {
                Ok(Ok(())) => tracing::info!(task = name, "Background task stopped"),
                Ok(Err(e)) => tracing::error!(task = name, error = %e, "Background task panicked"),
                Err(_) => tracing::warn!(
                    task = name,
                    grace_secs = grace.as_secs(),
                    "Background task did not stop within the grace period",
                ),
            }
        }
    }
}
