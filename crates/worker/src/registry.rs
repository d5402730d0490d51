//! Flow registry.
//!
//! Holds an immutable [`Snapshot`] of discovered flows merged with the
//! locally configured overrides. Readers clone the current `Arc<Snapshot>`
//! and never block writers for longer than a pointer swap. Writers (reload
//! and the admin enable/disable operations) merge and swap under an async
//! mutex, so there is only ever one writer. Discovery itself runs outside
//! that mutex.

use std::collections::BTreeMap;
use std::sync::{Arc, RwLock};
use std::time::Duration;

use chrono::Utc;
use flowgate_core::types::{Payload, Timestamp};
use flowgate_db::models::flow_config::{FlowConfig, UpsertFlowConfig};
use flowgate_db::{FlowConfigStore, StoreError};
use flowgate_kodosumi::{DiscoveredFlow, EngineError, ExecutionEngine};
use serde::Serialize;
use tokio::sync::Mutex;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

/// A discovered flow together with its local configuration.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FlowDescriptor {
    pub key: String,
    /// Remote path used to launch the flow.
    pub path: String,
    pub name: String,
    pub description: String,
    pub version: String,
    pub author: String,
    pub tags: Vec<String>,
    pub input_schema: Option<Payload>,
    pub enabled: bool,
    /// Always `None` while the flow is disabled.
    pub agent_identifier: Option<String>,
}

impl FlowDescriptor {
    /// Accepting jobs: enabled with a payment identifier configured.
    pub fn is_active(&self) -> bool {
        self.enabled && self.agent_identifier.is_some()
    }

    fn merge(flow: &DiscoveredFlow, config: Option<&FlowConfig>) -> Self {
        let enabled = config.is_some_and(FlowConfig::is_active);
        Self {
            key: flow.key.clone(),
            path: flow.path.clone(),
            name: flow.name.clone(),
            description: flow.description.clone(),
            version: flow.version.clone(),
            author: flow.author.clone(),
            tags: flow.tags.clone(),
            input_schema: flow.input_schema.clone(),
            enabled,
            agent_identifier: config
                .filter(|_| enabled)
                .and_then(|c| c.agent_identifier.clone()),
        }
    }
}

/// Errors reported by registry writers. The previous snapshot is kept.
#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("flow discovery failed: {0}")]
    Discovery(#[from] EngineError),

    #[error("flow discovery timed out after {0:?}")]
    Timeout(Duration),

    #[error("flow configuration unavailable: {0}")]
    Store(#[from] StoreError),

    #[error("unknown flow `{0}`")]
    UnknownFlow(String),

    #[error("{0}")]
    Validation(String),
}

/// Immutable view of the registry at one point in time.
#[derive(Debug, Default)]
pub struct Snapshot {
    discovered: Vec<DiscoveredFlow>,
    flows: BTreeMap<String, Arc<FlowDescriptor>>,
    pub loaded_at: Option<Timestamp>,
}

impl Snapshot {
    fn build(discovered: Vec<DiscoveredFlow>, configs: &[FlowConfig]) -> Self {
        let by_key: BTreeMap<&str, &FlowConfig> =
            configs.iter().map(|c| (c.flow_key.as_str(), c)).collect();
        let flows = discovered
            .iter()
            .map(|flow| {
                let descriptor = FlowDescriptor::merge(flow, by_key.get(flow.key.as_str()).copied());
                (flow.key.clone(), Arc::new(descriptor))
            })
            .collect();

        Self {
            discovered,
            flows,
            loaded_at: Some(Utc::now()),
        }
    }
}

pub struct FlowRegistry {
    engine: Arc<dyn ExecutionEngine>,
    configs: Arc<dyn FlowConfigStore>,
    snapshot: RwLock<Arc<Snapshot>>,
    writer: Mutex<()>,
    call_timeout: Duration,
}

impl FlowRegistry {
    /// An empty registry; call [`reload`](Self::reload) to populate it.
    pub fn new(
        engine: Arc<dyn ExecutionEngine>,
        configs: Arc<dyn FlowConfigStore>,
        call_timeout: Duration,
    ) -> Self {
        Self {
            engine,
            configs,
            snapshot: RwLock::new(Arc::new(Snapshot::default())),
            writer: Mutex::new(()),
            call_timeout,
        }
    }

    /// Current snapshot.
    pub fn snapshot(&self) -> Arc<Snapshot> {
        match self.snapshot.read() {
            Ok(guard) => Arc::clone(&guard),
            Err(poisoned) => Arc::clone(&poisoned.into_inner()),
        }
    }

    fn replace(&self, next: Snapshot) {
        let next = Arc::new(next);
        match self.snapshot.write() {
            Ok(mut guard) => *guard = next,
            Err(poisoned) => *poisoned.into_inner() = next,
        }
    }

    pub fn get(&self, flow_key: &str) -> Option<Arc<FlowDescriptor>> {
        self.snapshot().flows.get(flow_key).cloned()
    }

    /// All flows, ordered by key.
    pub fn list(&self) -> Vec<Arc<FlowDescriptor>> {
        self.snapshot().flows.values().cloned().collect()
    }

    /// Flows currently accepting jobs.
    pub fn active(&self) -> Vec<Arc<FlowDescriptor>> {
        self.snapshot()
            .flows
            .values()
            .filter(|f| f.is_active())
            .cloned()
            .collect()
    }

    /// Rediscover flows and re-merge overrides.
    ///
    /// On any failure the previous snapshot stays in place and the error is
    /// returned. Returns the number of flows on success.
    pub async fn reload(&self) -> Result<usize, RegistryError> {
        let discovered = match tokio::time::timeout(self.call_timeout, self.engine.discover_flows()).await {
            Ok(Ok(flows)) => flows,
            Ok(Err(e)) => {
                tracing::warn!(error = %e, "Flow discovery failed, keeping previous flows");
                return Err(e.into());
            }
            Err(_) => {
                tracing::warn!(timeout_secs = self.call_timeout.as_secs(), "Flow discovery timed out, keeping previous flows");
                return Err(RegistryError::Timeout(self.call_timeout));
            }
        };

        let _writer = self.writer.lock().await;
        let configs = self.configs.list().await.inspect_err(|e| {
            tracing::warn!(error = %e, "Flow configuration unavailable, keeping previous flows");
        })?;

        let snapshot = Snapshot::build(discovered, &configs);
        let count = snapshot.flows.len();
        let active = snapshot.flows.values().filter(|f| f.is_active()).count();
        self.replace(snapshot);

        tracing::info!(flow_count = count, active_count = active, "Flow registry reloaded");
        Ok(count)
    }

    /// Enable a flow under `agent_identifier`.
    pub async fn enable(
        &self,
        flow_key: &str,
        agent_identifier: &str,
    ) -> Result<Arc<FlowDescriptor>, RegistryError> {
        let agent_identifier = agent_identifier.trim();
        if agent_identifier.is_empty() {
            return Err(RegistryError::Validation(
                "agent_identifier must not be empty".into(),
            ));
        }
        self.configure(flow_key, true, Some(agent_identifier.to_string()))
            .await
    }

    /// Disable a flow; its payment identifier is cleared.
    pub async fn disable(&self, flow_key: &str) -> Result<Arc<FlowDescriptor>, RegistryError> {
        self.configure(flow_key, false, None).await
    }

    /// Persist an override and re-merge against the last discovered list
    /// without calling the engine.
    async fn configure(
        &self,
        flow_key: &str,
        enabled: bool,
        agent_identifier: Option<String>,
    ) -> Result<Arc<FlowDescriptor>, RegistryError> {
        let _writer = self.writer.lock().await;

        let current = self.snapshot();
        let flow = current
            .discovered
            .iter()
            .find(|f| f.key == flow_key)
            .ok_or_else(|| RegistryError::UnknownFlow(flow_key.to_string()))?;

        self.configs
            .upsert(UpsertFlowConfig {
                flow_key: flow_key.to_string(),
                enabled,
                agent_identifier,
                flow_name: Some(flow.name.clone()),
            })
            .await?;
        let configs = self.configs.list().await?;

        let snapshot = Snapshot::build(current.discovered.clone(), &configs);
        let descriptor = snapshot
            .flows
            .get(flow_key)
            .cloned()
            .ok_or_else(|| RegistryError::UnknownFlow(flow_key.to_string()))?;
        self.replace(snapshot);

        tracing::info!(flow_key, enabled, "Flow configuration updated");
        Ok(descriptor)
    }

    /// Reload on `period` until `cancel` fires.
    pub async fn run_refresh_loop(&self, period: Duration, cancel: CancellationToken) {
        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // The first tick fires immediately; startup already reloaded.
        ticker.tick().await;

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    tracing::info!("Flow refresher shutting down");
                    break;
                }
                _ = ticker.tick() => {
                    // Failures are logged inside reload and the last good
                    // snapshot stays in place.
                    let _ = self.reload().await;
                }
            }
        }
    }
}
