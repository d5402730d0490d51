//! Repository for the `flow_configs` table.

use sqlx::PgPool;

use crate::models::flow_config::{FlowConfig, UpsertFlowConfig};

/// Column list for `flow_configs` queries.
const COLUMNS: &str = "flow_key, enabled, agent_identifier, flow_name, updated_at";

/// Provides query operations for per-flow overrides.
pub struct FlowConfigRepo;

impl FlowConfigRepo {
    /// All configured overrides, ordered by flow key.
    pub async fn list(pool: &PgPool) -> Result<Vec<FlowConfig>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM flow_configs ORDER BY flow_key");
        sqlx::query_as::<_, FlowConfig>(&query).fetch_all(pool).await
    }

    /// Create or replace the override for a flow.
    ///
    /// A `NULL` flow name keeps whatever name was stored before.
    pub async fn upsert(
        pool: &PgPool,
        input: &UpsertFlowConfig,
    ) -> Result<FlowConfig, sqlx::Error> {
        let query = format!(
            "INSERT INTO flow_configs (flow_key, enabled, agent_identifier, flow_name) \
             VALUES ($1, $2, $3, $4) \
             ON CONFLICT (flow_key) DO UPDATE SET \
                 enabled = EXCLUDED.enabled, \
                 agent_identifier = EXCLUDED.agent_identifier, \
                 flow_name = COALESCE(EXCLUDED.flow_name, flow_configs.flow_name), \
                 updated_at = NOW() \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, FlowConfig>(&query)
            .bind(&input.flow_key)
            .bind(input.enabled)
            .bind(&input.agent_identifier)
            .bind(&input.flow_name)
            .fetch_one(pool)
            .await
    }
}
