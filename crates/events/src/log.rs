//! Structured logging of committed transitions.

use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;

use crate::bus::JobEvent;

/// Background subscriber that logs every [`JobEvent`].
pub struct TransitionLog;

impl TransitionLog {
    /// Run until `cancel` fires or the bus is dropped.
    pub async fn run(mut receiver: broadcast::Receiver<JobEvent>, cancel: CancellationToken) {
        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                received = receiver.recv() => match received {
                    Ok(event) => Self::record(&event),
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        tracing::warn!(skipped = n, "Transition log lagged");
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                },
            }
        }
        tracing::debug!("Transition log stopped");
    }

    fn record(event: &JobEvent) {
        let from = event.from.map(|s| s.as_str()).unwrap_or("none");
        if event.to.is_terminal() {
            tracing::info!(
                job_id = %event.job_id,
                flow_key = %event.flow_key,
                from,
                to = %event.to,
                detail = event.detail.as_deref().unwrap_or(""),
                "Job finished",
            );
        } else {
            tracing::debug!(
                job_id = %event.job_id,
                flow_key = %event.flow_key,
                from,
                to = %event.to,
                "Job transitioned",
            );
        }
    }
}
