//! Locally configured per-flow overrides (enable flag + payment identifier).

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use flowgate_core::types::Timestamp;

/// A row from the `flow_configs` table.
#[derive(Debug, Clone, PartialEq, FromRow, Serialize)]
pub struct FlowConfig {
    pub flow_key: String,
    pub enabled: bool,
    /// Identifier the payment processor knows this flow's agent by.
    pub agent_identifier: Option<String>,
    pub flow_name: Option<String>,
    pub updated_at: Timestamp,
}

impl FlowConfig {
    /// A flow can take jobs only when enabled with an identifier configured.
    pub fn is_active(&self) -> bool {
        self.enabled && self.agent_identifier.is_some()
    }
}

/// DTO for creating or replacing a flow's override.
#[derive(Debug, Clone, Deserialize)]
pub struct UpsertFlowConfig {
    pub flow_key: String,
    pub enabled: bool,
    pub agent_identifier: Option<String>,
    pub flow_name: Option<String>,
}
