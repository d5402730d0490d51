//! Job lifecycle states and the transition graph between them.
//!
//! ```text
//! pending_payment ──> payment_confirmed ──> starting ──> running ──> completed
//!        │                    │                │            │
//!        ├──> payment_expired └────────────────┴────────────┴──> failed
//!        └──────────────────────────────────────────────────────> failed
//! ```
//!
//! Discriminants match the seed order of the `status_id` column.

use serde::{Deserialize, Serialize};

/// Status ID type matching SMALLINT in the database.
pub type StatusId = i16;

/// Current position of a job in its lifecycle.
#[repr(i16)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    PendingPayment = 1,
    PaymentConfirmed = 2,
    Starting = 3,
    Running = 4,
    Completed = 5,
    Failed = 6,
    PaymentExpired = 7,
}

impl JobStatus {
    pub const ALL: [JobStatus; 7] = [
        JobStatus::PendingPayment,
        JobStatus::PaymentConfirmed,
        JobStatus::Starting,
        JobStatus::Running,
        JobStatus::Completed,
        JobStatus::Failed,
        JobStatus::PaymentExpired,
    ];

    /// Return the database status ID.
    pub fn id(self) -> StatusId {
        self as StatusId
    }

    /// Look up a status by its database ID.
    pub fn from_id(id: StatusId) -> Option<Self> {
        Self::ALL.into_iter().find(|s| s.id() == id)
    }

    /// Snake-case name used in logs, events and API payloads.
    pub fn as_str(self) -> &'static str {
        match self {
            JobStatus::PendingPayment => "pending_payment",
            JobStatus::PaymentConfirmed => "payment_confirmed",
            JobStatus::Starting => "starting",
            JobStatus::Running => "running",
            JobStatus::Completed => "completed",
            JobStatus::Failed => "failed",
            JobStatus::PaymentExpired => "payment_expired",
        }
    }

    /// Parse a snake-case status name.
    pub fn parse(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|s| s.as_str() == name)
    }

    /// Terminal jobs are never selected by either polling loop again.
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            JobStatus::Completed | JobStatus::Failed | JobStatus::PaymentExpired
        )
    }

    /// Whether the record has reached the remote engine (`starting` or later
    /// on the success path).
    pub fn is_launched(self) -> bool {
        matches!(
            self,
            JobStatus::Starting | JobStatus::Running | JobStatus::Completed
        )
    }

    /// Whether `self -> next` is an edge of the lifecycle graph.
    ///
    /// Staying in the same non-terminal state is allowed so that observation
    /// updates (e.g. the last remote status) can use the same conditional
    /// write as real transitions.
    pub fn can_transition_to(self, next: JobStatus) -> bool {
        use JobStatus::*;

        if self.is_terminal() {
            return false;
        }
        if self == next {
            return true;
        }
        matches!(
            (self, next),
            (PendingPayment, PaymentConfirmed)
                | (PendingPayment, PaymentExpired)
                | (PaymentConfirmed, Starting)
                | (Starting, Running)
                | (Running, Completed)
                | (_, Failed)
        )
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A `status_id` column held a value with no matching [`JobStatus`].
#[derive(Debug, thiserror::Error)]
#[error("unknown job status id {0}")]
pub struct UnknownStatusId(pub StatusId);

impl TryFrom<StatusId> for JobStatus {
    type Error = UnknownStatusId;

    fn try_from(value: StatusId) -> Result<Self, Self::Error> {
        JobStatus::from_id(value).ok_or(UnknownStatusId(value))
    }
}

impl From<JobStatus> for StatusId {
    fn from(value: JobStatus) -> Self {
        value as StatusId
    }
}
