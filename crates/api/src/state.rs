use std::sync::Arc;

use flowgate_db::JobStore;
use flowgate_masumi::MasumiConfig;
use flowgate_worker::{FlowRegistry, JobService};

use crate::config::ServerConfig;

/// Shared application state available to all handlers via `State<AppState>`.
///
/// Cheaply cloneable; everything is behind an `Arc`.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<ServerConfig>,
    /// Price, unit and seller key advertised to purchasers.
    pub payment: Arc<MasumiConfig>,
    pub jobs: Arc<JobService>,
    pub registry: Arc<FlowRegistry>,
    /// Used directly only for health checks.
    pub store: Arc<dyn JobStore>,
}
