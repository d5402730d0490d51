//! The execution engine seam and the types it exchanges.

use async_trait::async_trait;
use flowgate_core::types::Payload;
use serde::Serialize;

use crate::error::EngineError;

/// A flow advertised by the engine.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DiscoveredFlow {
    /// Path-safe key derived from `path`.
    pub key: String,
    /// Remote path the flow is launched at.
    pub path: String,
    pub name: String,
    pub description: String,
    pub version: String,
    pub author: String,
    pub tags: Vec<String>,
    /// Input form definition; `None` if it could not be fetched.
    pub input_schema: Option<Payload>,
}

/// Coarse lifecycle of a remote run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunState {
    Starting,
    Running,
    Finished,
    Failed { reason: String },
}

/// What the engine reported for one run.
#[derive(Debug, Clone, PartialEq)]
pub struct RunStatus {
    pub state: RunState,
    /// Status string exactly as the engine reported it.
    pub remote_status: String,
    /// Partial progress, if the engine has produced any yet.
    pub progress: Option<Payload>,
}

impl RunStatus {
    /// Whether the run has shown any sign of doing work.
    pub fn has_progress(&self) -> bool {
        self.state != RunState::Starting || self.progress.is_some()
    }
}

/// Client for the remote execution engine.
#[async_trait]
pub trait ExecutionEngine: Send + Sync {
    /// All flows currently exposed by the engine.
    async fn discover_flows(&self) -> Result<Vec<DiscoveredFlow>, EngineError>;

    /// Start `flow_path` with `input`, returning the remote run id.
    async fn launch(&self, flow_path: &str, input: &Payload) -> Result<String, EngineError>;

    async fn get_status(&self, run_id: &str) -> Result<RunStatus, EngineError>;

    /// Final result of a finished run. Fails with
    /// [`EngineError::ResultUnavailable`] before that.
    async fn get_result(&self, run_id: &str) -> Result<Payload, EngineError>;
}
