use std::sync::Arc;

use flowgate_api::config::ServerConfig;
use flowgate_api::router::build_app_router;
use flowgate_api::state::AppState;
use flowgate_db::{FlowConfigStore, JobStore};
use flowgate_events::EventBus;
use flowgate_kodosumi::{KodosumiApi, KodosumiConfig};
use flowgate_masumi::MasumiConfig;
use flowgate_worker::{BackgroundTasks, Coordinator, CoordinatorConfig, FlowRegistry, JobService};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "flowgate_api=debug,flowgate_worker=debug,tower_http=debug".into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = ServerConfig::from_env();
    let coordinator_config = CoordinatorConfig::from_env();
    let masumi = MasumiConfig::from_env();
    let kodosumi = KodosumiConfig::from_env();

    let (jobs, flow_configs) = open_stores(&config).await;

    let payments = flowgate_masumi::build_gateway(&masumi);
    let engine = Arc::new(KodosumiApi::new(&kodosumi));
    let events = Arc::new(EventBus::default());

    let registry = Arc::new(FlowRegistry::new(
        engine.clone(),
        flow_configs,
        coordinator_config.call_timeout,
    ));
    match registry.reload().await {
        Ok(count) => tracing::info!(flow_count = count, "Flows discovered"),
        Err(e) => tracing::warn!(
            error = %e,
            "Initial flow discovery failed; will retry on the refresh interval",
        ),
    }

    let shutdown_grace = coordinator_config.shutdown_grace;
    let coordinator = Arc::new(Coordinator::new(
        Arc::clone(&jobs),
        Arc::clone(&payments),
        engine,
        Arc::clone(&events),
        coordinator_config,
    ));
    let service = Arc::new(JobService::new(
        Arc::clone(&jobs),
        payments,
        Arc::clone(&registry),
        Arc::clone(&coordinator),
        Arc::clone(&events),
    ));
    let tasks = BackgroundTasks::spawn(coordinator, Arc::clone(&registry), &events);

    let state = AppState {
        config: Arc::new(config.clone()),
        payment: Arc::new(masumi),
        jobs: service,
        registry,
        store: jobs,
    };

    let app = build_app_router(state, &config);

    let addr = format!("{}:{}", config.host, config.port);
    tracing::info!(%addr, "Starting server");

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .expect("Failed to bind address");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("Server error");

    tracing::info!("HTTP server stopped, waiting for background tasks");
    tasks.shutdown(shutdown_grace).await;
    tracing::info!("Server shut down");
}

/// Postgres stores when `DATABASE_URL` is set, in-memory stores otherwise.
async fn open_stores(config: &ServerConfig) -> (Arc<dyn JobStore>, Arc<dyn FlowConfigStore>) {
    let Some(database_url) = &config.database_url else {
        tracing::warn!("DATABASE_URL not set; jobs are kept in memory and lost on restart");
        return (
            Arc::new(flowgate_db::MemoryJobStore::new()),
            Arc::new(flowgate_db::MemoryFlowConfigStore::new()),
        );
    };

    let pool = flowgate_db::create_pool(database_url)
        .await
        .expect("Failed to connect to database");
    flowgate_db::run_migrations(&pool)
        .await
        .expect("Failed to run database migrations");
    tracing::info!("Database ready");

    (
        Arc::new(flowgate_db::PgJobStore::new(pool.clone())),
        Arc::new(flowgate_db::PgFlowConfigStore::new(pool)),
    )
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
