#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{Duration as ChronoDuration, Utc};
use flowgate_core::status::JobStatus;
use flowgate_core::types::{Payload, Timestamp};
use flowgate_db::models::job::{JobRecord, NewJob};
use flowgate_db::{JobStore, MemoryFlowConfigStore, MemoryJobStore};
use flowgate_events::{EventBus, JobEvent};
use flowgate_kodosumi::{DiscoveredFlow, EngineError, ExecutionEngine, RunState, RunStatus};
use flowgate_masumi::{PaymentError, PaymentGateway, PaymentRequest, PaymentStatus, PaymentTerms};
use flowgate_worker::{Coordinator, CoordinatorConfig, FlowRegistry, JobService, SubmitJob};
use serde_json::json;
use tokio::sync::broadcast;
use uuid::Uuid;

pub const FLOW_KEY: &str = "hello";
pub const AGENT_ID: &str = "agent-hello";

// ---------------------------------------------------------------------------
// Payment gateway fake
// ---------------------------------------------------------------------------

/// What the fake gateway answers for a status check.
#[derive(Debug, Clone, Copy)]
pub enum GatewayReply {
    Status(PaymentStatus),
    Unreachable,
    Hang,
}

pub struct FakeGateway {
    default_reply: Mutex<GatewayReply>,
    replies: Mutex<HashMap<String, GatewayReply>>,
    request_fails: AtomicBool,
    requests: AtomicUsize,
    pub status_checks: AtomicUsize,
    pub submitted: Mutex<Vec<(String, String)>>,
}

impl FakeGateway {
    pub fn new() -> Self {
        Self {
            default_reply: Mutex::new(GatewayReply::Status(PaymentStatus::Unconfirmed)),
            replies: Mutex::new(HashMap::new()),
            request_fails: AtomicBool::new(false),
            requests: AtomicUsize::new(0),
            status_checks: AtomicUsize::new(0),
            submitted: Mutex::new(Vec::new()),
        }
    }

    /// Reply used for every identifier without its own script.
    pub fn reply_with(&self, reply: GatewayReply) {
        *self.default_reply.lock().unwrap() = reply;
    }

    pub fn reply_for(&self, blockchain_identifier: &str, reply: GatewayReply) {
        self.replies
            .lock()
            .unwrap()
            .insert(blockchain_identifier.to_string(), reply);
    }

    pub fn fail_requests(&self) {
        self.request_fails.store(true, Ordering::SeqCst);
    }

    pub fn request_count(&self) -> usize {
        self.requests.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PaymentGateway for FakeGateway {
    async fn request_payment(&self, _terms: &PaymentTerms) -> Result<PaymentRequest, PaymentError> {
        let n = self.requests.fetch_add(1, Ordering::SeqCst) + 1;
        if self.request_fails.load(Ordering::SeqCst) {
            return Err(PaymentError::Rejected {
                status: 400,
                body: "agent not registered".into(),
            });
        }
        let now = Utc::now();
        Ok(PaymentRequest {
            blockchain_identifier: format!("bid-{n}"),
            pay_by: now + ChronoDuration::hours(12),
            submit_by: now + ChronoDuration::hours(24),
            unlock_at: now + ChronoDuration::hours(48),
            external_dispute_unlock_at: now + ChronoDuration::hours(72),
        })
    }

    async fn check_payment_status(
        &self,
        blockchain_identifier: &str,
    ) -> Result<PaymentStatus, PaymentError> {
        self.status_checks.fetch_add(1, Ordering::SeqCst);
        let reply = self
            .replies
            .lock()
            .unwrap()
            .get(blockchain_identifier)
            .copied()
            .unwrap_or(*self.default_reply.lock().unwrap());

        match reply {
            GatewayReply::Status(status) => Ok(status),
            GatewayReply::Unreachable => Err(PaymentError::Rejected {
                status: 503,
                body: "service unavailable".into(),
            }),
            GatewayReply::Hang => {
                tokio::time::sleep(Duration::from_secs(3600)).await;
                Ok(PaymentStatus::Unconfirmed)
            }
        }
    }

    async fn submit_result(
        &self,
        blockchain_identifier: &str,
        result_hash: &str,
    ) -> Result<(), PaymentError> {
        self.submitted
            .lock()
            .unwrap()
            .push((blockchain_identifier.to_string(), result_hash.to_string()));
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Execution engine fake
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub enum EngineReply {
    Status(RunStatus),
    Unreachable,
}

pub fn run_status(state: RunState) -> RunStatus {
    let remote_status = match &state {
        RunState::Starting => "starting",
        RunState::Running => "running",
        RunState::Finished => "finished",
        RunState::Failed { .. } => "error",
    };
    RunStatus {
        state,
        remote_status: remote_status.into(),
        progress: None,
    }
}

pub struct FakeEngine {
    flows: Mutex<Vec<DiscoveredFlow>>,
    discover_fails: AtomicBool,
    pub discover_calls: AtomicUsize,
    launch_error: Mutex<Option<String>>,
    launches: AtomicUsize,
    statuses: Mutex<HashMap<String, EngineReply>>,
    results: Mutex<HashMap<String, Payload>>,
}

impl FakeEngine {
    pub fn new(flows: Vec<DiscoveredFlow>) -> Self {
        Self {
            flows: Mutex::new(flows),
            discover_fails: AtomicBool::new(false),
            discover_calls: AtomicUsize::new(0),
            launch_error: Mutex::new(None),
            launches: AtomicUsize::new(0),
            statuses: Mutex::new(HashMap::new()),
            results: Mutex::new(HashMap::new()),
        }
    }

    pub fn set_flows(&self, flows: Vec<DiscoveredFlow>) {
        *self.flows.lock().unwrap() = flows;
    }

    pub fn fail_discovery(&self, fail: bool) {
        self.discover_fails.store(fail, Ordering::SeqCst);
    }

    pub fn fail_launches(&self, reason: &str) {
        *self.launch_error.lock().unwrap() = Some(reason.to_string());
    }

    pub fn launch_count(&self) -> usize {
        self.launches.load(Ordering::SeqCst)
    }

    pub fn set_status(&self, run_id: &str, reply: EngineReply) {
        self.statuses
            .lock()
            .unwrap()
            .insert(run_id.to_string(), reply);
    }

    pub fn finish(&self, run_id: &str, result: Payload) {
        self.results.lock().unwrap().insert(run_id.to_string(), result);
        self.set_status(run_id, EngineReply::Status(run_status(RunState::Finished)));
    }
}

#[async_trait]
impl ExecutionEngine for FakeEngine {
    async fn discover_flows(&self) -> Result<Vec<DiscoveredFlow>, EngineError> {
        self.discover_calls.fetch_add(1, Ordering::SeqCst);
        if self.discover_fails.load(Ordering::SeqCst) {
            return Err(EngineError::Rejected {
                status: 502,
                body: "bad gateway".into(),
            });
        }
        Ok(self.flows.lock().unwrap().clone())
    }

    async fn launch(&self, _flow_path: &str, _input: &Payload) -> Result<String, EngineError> {
        let n = self.launches.fetch_add(1, Ordering::SeqCst) + 1;
        if let Some(reason) = self.launch_error.lock().unwrap().clone() {
            return Err(EngineError::Rejected {
                status: 422,
                body: reason,
            });
        }
        let run_id = format!("run-{n}");
        self.set_status(&run_id, EngineReply::Status(run_status(RunState::Starting)));
        Ok(run_id)
    }

    async fn get_status(&self, run_id: &str) -> Result<RunStatus, EngineError> {
        // Give concurrently polled cycles a chance to interleave.
        tokio::task::yield_now().await;
        let reply = self.statuses.lock().unwrap().get(run_id).cloned();
        match reply {
            Some(EngineReply::Status(status)) => Ok(status),
            Some(EngineReply::Unreachable) => Err(EngineError::Rejected {
                status: 503,
                body: "engine unavailable".into(),
            }),
            None => Err(EngineError::Malformed(format!("unknown run {run_id}"))),
        }
    }

    async fn get_result(&self, run_id: &str) -> Result<Payload, EngineError> {
        tokio::task::yield_now().await;
        self.results
            .lock()
            .unwrap()
            .get(run_id)
            .cloned()
            .ok_or_else(|| EngineError::ResultUnavailable {
                run_id: run_id.to_string(),
                status: "running".into(),
            })
    }
}

pub fn discovered(key: &str) -> DiscoveredFlow {
    DiscoveredFlow {
        key: key.to_string(),
        path: format!("/-/{key}/-/"),
        name: format!("{key} flow"),
        description: String::new(),
        version: "1.0.0".into(),
        author: "tests".into(),
        tags: Vec::new(),
        input_schema: Some(json!({"elements": [{"type": "text", "name": "prompt"}]})),
    }
}

// ---------------------------------------------------------------------------
// Harness
// ---------------------------------------------------------------------------

pub struct Harness {
    pub store: Arc<MemoryJobStore>,
    pub configs: Arc<MemoryFlowConfigStore>,
    pub gateway: Arc<FakeGateway>,
    pub engine: Arc<FakeEngine>,
    pub events: Arc<EventBus>,
    pub coordinator: Arc<Coordinator>,
    pub registry: Arc<FlowRegistry>,
    pub service: JobService,
}

pub fn test_config() -> CoordinatorConfig {
    CoordinatorConfig {
        call_timeout: Duration::from_secs(2),
        ..CoordinatorConfig::default()
    }
}

/// Harness with the `hello` flow discovered and enabled.
pub async fn harness() -> Harness {
    harness_with(test_config()).await
}

pub async fn harness_with(config: CoordinatorConfig) -> Harness {
    let store = Arc::new(MemoryJobStore::new());
    let configs = Arc::new(MemoryFlowConfigStore::new());
    let gateway = Arc::new(FakeGateway::new());
    let engine = Arc::new(FakeEngine::new(vec![discovered(FLOW_KEY), discovered("other")]));
    let events = Arc::new(EventBus::default());

    let registry = Arc::new(FlowRegistry::new(
        engine.clone(),
        configs.clone(),
        config.call_timeout,
    ));
    registry.reload().await.expect("initial reload");
    registry
        .enable(FLOW_KEY, AGENT_ID)
        .await
        .expect("enable hello flow");

    let coordinator = Arc::new(Coordinator::new(
        store.clone(),
        gateway.clone(),
        engine.clone(),
        Arc::clone(&events),
        config,
    ));
    let service = JobService::new(
        store.clone(),
        gateway.clone(),
        Arc::clone(&registry),
        Arc::clone(&coordinator),
        Arc::clone(&events),
    );

    Harness {
        store,
        configs,
        gateway,
        engine,
        events,
        coordinator,
        registry,
        service,
    }
}

pub fn submission(amount: i64) -> SubmitJob {
    SubmitJob {
        flow_key: FLOW_KEY.to_string(),
        identifier_from_purchaser: "buyer-1".to_string(),
        input: json!({"prompt": "hello"}),
        amount,
        payment_unit: "lovelace".to_string(),
    }
}

impl Harness {
    pub async fn reload(&self, id: Uuid) -> JobRecord {
        self.store.find(id).await.unwrap().expect("job exists")
    }

    /// Insert a record directly, bypassing submission.
    pub async fn insert(
        &self,
        status: JobStatus,
        blockchain_identifier: Option<&str>,
        pay_by: Option<Timestamp>,
        submit_by: Option<Timestamp>,
    ) -> JobRecord {
        self.store
            .insert(NewJob {
                id: Uuid::now_v7(),
                flow_key: FLOW_KEY.to_string(),
                flow_path: format!("/-/{FLOW_KEY}/-/"),
                identifier_from_purchaser: "buyer-1".to_string(),
                status,
                amount: 10_000_000,
                payment_unit: "lovelace".to_string(),
                agent_identifier: Some(AGENT_ID.to_string()),
                blockchain_identifier: blockchain_identifier.map(str::to_owned),
                input_hash: "hash".to_string(),
                pay_by_at: pay_by,
                submit_by_at: submit_by,
                unlock_at: None,
                external_dispute_unlock_at: None,
                input_data: json!({"prompt": "hello"}),
            })
            .await
            .unwrap()
    }

    /// Submit a paid job and drive it to `starting`.
    pub async fn launched_job(&self) -> JobRecord {
        let job = self.service.submit(submission(10_000_000)).await.unwrap();
        self.gateway.reply_with(GatewayReply::Status(PaymentStatus::Confirmed));
        self.coordinator.run_payment_cycle().await;
        let job = self.reload(job.id).await;
        assert_eq!(job.status, JobStatus::Starting);
        job
    }
}

/// Drain every event currently buffered on `rx`.
pub fn drain(rx: &mut broadcast::Receiver<JobEvent>) -> Vec<JobEvent> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}

pub fn past(minutes: i64) -> Timestamp {
    Utc::now() - ChronoDuration::minutes(minutes)
}

pub fn future(minutes: i64) -> Timestamp {
    Utc::now() + ChronoDuration::minutes(minutes)
}
