#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::response::Response;
use axum::Router;
use flowgate_api::config::ServerConfig;
use flowgate_api::router::build_app_router;
use flowgate_api::state::AppState;
use flowgate_core::types::Payload;
use flowgate_db::{MemoryFlowConfigStore, MemoryJobStore};
use flowgate_events::EventBus;
use flowgate_kodosumi::{DiscoveredFlow, EngineError, ExecutionEngine, RunState, RunStatus};
use flowgate_masumi::{MasumiConfig, SimulatedPaymentGateway};
use flowgate_worker::{Coordinator, CoordinatorConfig, FlowRegistry, JobService};
use http_body_util::BodyExt;
use serde_json::{json, Value};
use tower::ServiceExt;

pub const FLOW_KEY: &str = "hello";
pub const AGENT_ID: &str = "agent-hello";

/// Engine whose runs finish immediately with `{"output": "ok"}`.
pub struct InstantEngine {
    discover_fails: AtomicBool,
    launches: AtomicUsize,
}

impl InstantEngine {
    fn new() -> Self {
        Self {
            discover_fails: AtomicBool::new(false),
            launches: AtomicUsize::new(0),
        }
    }

    pub fn fail_discovery(&self, fail: bool) {
        self.discover_fails.store(fail, Ordering::SeqCst);
    }

    pub fn launch_count(&self) -> usize {
        self.launches.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ExecutionEngine for InstantEngine {
    async fn discover_flows(&self) -> Result<Vec<DiscoveredFlow>, EngineError> {
        if self.discover_fails.load(Ordering::SeqCst) {
            return Err(EngineError::Rejected {
                status: 502,
                body: "bad gateway".into(),
            });
        }
        Ok(vec![discovered(FLOW_KEY), discovered("other")])
    }

    async fn launch(&self, _flow_path: &str, _input: &Payload) -> Result<String, EngineError> {
        let n = self.launches.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(format!("run-{n}"))
    }

    async fn get_status(&self, _run_id: &str) -> Result<RunStatus, EngineError> {
        Ok(RunStatus {
            state: RunState::Finished,
            remote_status: "finished".into(),
            progress: None,
        })
    }

    async fn get_result(&self, _run_id: &str) -> Result<Payload, EngineError> {
        Ok(json!({"output": "ok"}))
    }
}

fn discovered(key: &str) -> DiscoveredFlow {
    DiscoveredFlow {
        key: key.to_string(),
        path: format!("/-/{key}/-/"),
        name: format!("{key} flow"),
        description: format!("The {key} flow"),
        version: "1.0.0".into(),
        author: "tests".into(),
        tags: vec!["test".into()],
        input_schema: Some(json!([{"id": "prompt", "type": "string"}])),
    }
}

/// Build a test `ServerConfig` with safe defaults.
pub fn test_config() -> ServerConfig {
    ServerConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
        cors_origins: vec!["http://localhost:3000".to_string()],
        request_timeout_secs: 30,
        database_url: None,
    }
}

pub struct TestApp {
    pub router: Router,
    pub coordinator: Arc<Coordinator>,
    pub registry: Arc<FlowRegistry>,
    pub engine: Arc<InstantEngine>,
}

/// App with `hello` enabled and payments confirmed as soon as they are
/// checked.
pub async fn build_test_app() -> TestApp {
    build_test_app_with(Duration::ZERO).await
}

/// App whose simulated payments confirm after `confirm_after`.
pub async fn build_test_app_with(confirm_after: Duration) -> TestApp {
    let store = Arc::new(MemoryJobStore::new());
    let configs = Arc::new(MemoryFlowConfigStore::new());
    let payments = Arc::new(SimulatedPaymentGateway::new(confirm_after));
    let engine = Arc::new(InstantEngine::new());
    let events = Arc::new(EventBus::default());
    let coordinator_config = CoordinatorConfig {
        call_timeout: Duration::from_secs(2),
        ..CoordinatorConfig::default()
    };

    let registry = Arc::new(FlowRegistry::new(
        engine.clone(),
        configs,
        coordinator_config.call_timeout,
    ));
    registry.reload().await.expect("initial reload");
    registry
        .enable(FLOW_KEY, AGENT_ID)
        .await
        .expect("enable hello flow");

    let coordinator = Arc::new(Coordinator::new(
        store.clone(),
        payments.clone(),
        engine.clone(),
        Arc::clone(&events),
        coordinator_config,
    ));
    let service = Arc::new(JobService::new(
        store.clone(),
        payments,
        Arc::clone(&registry),
        Arc::clone(&coordinator),
        events,
    ));

    let config = test_config();
    let state = AppState {
        config: Arc::new(config.clone()),
        payment: Arc::new(MasumiConfig {
            seller_vkey: Some("seller-vkey".into()),
            ..MasumiConfig::simulated()
        }),
        jobs: service,
        registry: Arc::clone(&registry),
        store,
    };

    TestApp {
        router: build_app_router(state, &config),
        coordinator,
        registry,
        engine,
    }
}

impl TestApp {
    pub async fn get(&self, uri: &str) -> Response {
        let request = Request::builder()
            .uri(uri)
            .body(Body::empty())
            .unwrap();
        self.router.clone().oneshot(request).await.unwrap()
    }

    pub async fn post_json(&self, uri: &str, body: Value) -> Response {
        let request = Request::builder()
            .method("POST")
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap();
        self.router.clone().oneshot(request).await.unwrap()
    }

    pub async fn post_empty(&self, uri: &str) -> Response {
        let request = Request::builder()
            .method("POST")
            .uri(uri)
            .body(Body::empty())
            .unwrap();
        self.router.clone().oneshot(request).await.unwrap()
    }

    /// Start a `hello` job and return the response document.
    pub async fn start_job(&self, purchaser: &str) -> Value {
        let response = self
            .post_json(
                &format!("/mip003/{FLOW_KEY}/start_job"),
                json!({
                    "identifier_from_purchaser": purchaser,
                    "input_data": {"prompt": "hi"},
                }),
            )
            .await;
        assert_eq!(response.status(), StatusCode::OK);
        body_json(response).await
    }
}

/// Read a response body as JSON.
pub async fn body_json(response: Response) -> Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}
