//! In-process event bus backed by a `tokio::sync::broadcast` channel.
//!
//! [`EventBus`] is shared via `Arc<EventBus>` between the coordinator, the
//! job service and anything that wants to observe transitions.

use chrono::Utc;
use flowgate_core::status::JobStatus;
use flowgate_core::types::{JobId, Timestamp};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

/// A status transition that has been committed to the job store.
///
/// Published only after the conditional write succeeded, so subscribers
/// never see a transition that lost a race.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobEvent {
    pub job_id: JobId,
    pub flow_key: String,
    /// `None` for the creation event.
    pub from: Option<JobStatus>,
    pub to: JobStatus,
    /// Error message or remote status that accompanied the transition.
    pub detail: Option<String>,
    pub at: Timestamp,
}

impl JobEvent {
    /// A record was inserted in `status`.
    pub fn created(job_id: JobId, flow_key: impl Into<String>, status: JobStatus) -> Self {
        Self {
            job_id,
            flow_key: flow_key.into(),
            from: None,
            to: status,
            detail: None,
            at: Utc::now(),
        }
    }

    /// A record moved from `from` to `to`.
    pub fn transition(
        job_id: JobId,
        flow_key: impl Into<String>,
        from: JobStatus,
        to: JobStatus,
    ) -> Self {
        Self {
            from: Some(from),
            ..Self::created(job_id, flow_key, to)
        }
    }

    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }
}

/// Default buffer capacity for the broadcast channel.
const DEFAULT_CAPACITY: usize = 1024;

/// In-process fan-out event bus.
///
/// ```rust
/// use flowgate_core::status::JobStatus;
/// use flowgate_events::bus::{EventBus, JobEvent};
///
/// let bus = EventBus::default();
/// let mut rx = bus.subscribe();
///
/// bus.publish(JobEvent::created(uuid::Uuid::nil(), "hello", JobStatus::PendingPayment));
/// ```
pub struct EventBus {
    sender: broadcast::Sender<JobEvent>,
}

impl EventBus {
    /// Create a bus with a specific channel capacity.
    ///
    /// Slow receivers observe `RecvError::Lagged` once the buffer is full.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publish an event to all current subscribers.
    pub fn publish(&self, event: JobEvent) {
        // SendError only means there are zero receivers.
        let _ = self.sender.send(event);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<JobEvent> {
        self.sender.subscribe()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}
