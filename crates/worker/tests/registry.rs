//! Flow registry reload and configuration.

mod common;

use std::sync::atomic::Ordering;

use assert_matches::assert_matches;
use common::*;
use flowgate_worker::RegistryError;

#[tokio::test]
async fn failed_reload_keeps_previous_flows() {
    let h = harness().await;
    assert_eq!(h.registry.list().len(), 2);

    h.engine.fail_discovery(true);
    let result = h.registry.reload().await;

    assert_matches!(result, Err(RegistryError::Discovery(_)));
    assert_eq!(h.registry.list().len(), 2);
    assert!(h.registry.get(FLOW_KEY).unwrap().is_active());
}

#[tokio::test]
async fn reload_replaces_flow_list_and_keeps_overrides() {
    let h = harness().await;
    h.engine.set_flows(vec![discovered(FLOW_KEY), discovered("third")]);

    assert_eq!(h.registry.reload().await.unwrap(), 2);

    assert!(h.registry.get("other").is_none());
    assert!(h.registry.get("third").is_some());
    let hello = h.registry.get(FLOW_KEY).unwrap();
    assert!(hello.is_active());
    assert_eq!(hello.agent_identifier.as_deref(), Some(AGENT_ID));
}

#[tokio::test]
async fn enable_and_disable_do_not_call_engine() {
    let h = harness().await;
    let calls = h.engine.discover_calls.load(Ordering::SeqCst);

    let enabled = h.registry.enable("other", "agent-other").await.unwrap();
    assert!(enabled.is_active());
    assert_eq!(h.registry.active().len(), 2);

    let disabled = h.registry.disable("other").await.unwrap();
    assert!(!disabled.enabled);
    assert!(disabled.agent_identifier.is_none());

    assert_eq!(h.engine.discover_calls.load(Ordering::SeqCst), calls);
}

#[tokio::test]
async fn held_descriptor_is_not_mutated_by_later_writes() {
    let h = harness().await;
    let before = h.registry.get(FLOW_KEY).unwrap();

    h.registry.disable(FLOW_KEY).await.unwrap();

    assert!(before.is_active());
    assert!(!h.registry.get(FLOW_KEY).unwrap().is_active());
}

#[tokio::test]
async fn configuring_unknown_flow_fails() {
    let h = harness().await;
    assert_matches!(
        h.registry.enable("missing", "agent").await,
        Err(RegistryError::UnknownFlow(key)) if key == "missing"
    );
}

#[tokio::test]
async fn enabling_requires_identifier() {
    let h = harness().await;
    assert_matches!(
        h.registry.enable("other", " ").await,
        Err(RegistryError::Validation(_))
    );
}
