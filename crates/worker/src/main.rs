//! Standalone coordinator process: runs the polling loops and the flow
//! refresher without the HTTP surface.

use std::sync::Arc;

use flowgate_db::{FlowConfigStore, JobStore};
use flowgate_events::EventBus;
use flowgate_kodosumi::{KodosumiApi, KodosumiConfig};
use flowgate_masumi::MasumiConfig;
use flowgate_worker::{BackgroundTasks, Coordinator, CoordinatorConfig, FlowRegistry};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "flowgate_worker=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = CoordinatorConfig::from_env();
    let masumi = MasumiConfig::from_env();
    let kodosumi = KodosumiConfig::from_env();

    let database_url = std::env::var("DATABASE_URL").expect("DATABASE_URL must be set");
    let pool = flowgate_db::create_pool(&database_url)
        .await
        .expect("Failed to connect to database");
    flowgate_db::run_migrations(&pool)
        .await
        .expect("Failed to run database migrations");
    tracing::info!("Database ready");

    let jobs: Arc<dyn JobStore> = Arc::new(flowgate_db::PgJobStore::new(pool.clone()));
    let flow_configs: Arc<dyn FlowConfigStore> = Arc::new(flowgate_db::PgFlowConfigStore::new(pool));
    let payments = flowgate_masumi::build_gateway(&masumi);
    let engine = Arc::new(KodosumiApi::new(&kodosumi));
    let events = Arc::new(EventBus::default());

    let registry = Arc::new(FlowRegistry::new(engine.clone(), flow_configs, config.call_timeout));
    if let Err(e) = registry.reload().await {
        tracing::warn!(error = %e, "Initial flow discovery failed; will retry on the refresh interval");
    }

    let shutdown_grace = config.shutdown_grace;
    let coordinator = Arc::new(Coordinator::new(jobs, payments, engine, Arc::clone(&events), config));
    let tasks = BackgroundTasks::spawn(coordinator, registry, &events);

    shutdown_signal().await;
    tasks.shutdown(shutdown_grace).await;
    tracing::info!("Worker shut down");
}

/// Wait for SIGINT or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl-C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => tracing::info!("Received SIGINT, shutting down"),
        () = terminate => tracing::info!("Received SIGTERM, shutting down"),
    }
}
