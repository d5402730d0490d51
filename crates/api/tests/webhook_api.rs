mod common;

use std::time::Duration;

use axum::http::StatusCode;
use common::{body_json, build_test_app, build_test_app_with};
use serde_json::json;

#[tokio::test]
async fn confirmed_payment_notification_launches_the_job() {
    let app = build_test_app().await;
    let started = app.start_job("purchaser-1").await;
    let bid = started["blockchainIdentifier"].as_str().unwrap();

    let response = app
        .post_json("/webhooks/masumi/payment", json!({"blockchain_identifier": bid}))
        .await;
    assert_eq!(response.status(), StatusCode::OK);

    let json = body_json(response).await;
    assert_eq!(json["data"]["processed"], true);
    assert_eq!(json["data"]["job"]["job_status"], "starting");
    assert_eq!(app.engine.launch_count(), 1);
}

#[tokio::test]
async fn notification_is_verified_against_the_gateway() {
    let app = build_test_app_with(Duration::from_secs(3600)).await;
    let started = app.start_job("purchaser-1").await;
    let bid = started["blockchainIdentifier"].as_str().unwrap();

    let response = app
        .post_json("/webhooks/masumi/payment", json!({"blockchainIdentifier": bid}))
        .await;
    assert_eq!(response.status(), StatusCode::OK);

    let json = body_json(response).await;
    assert_eq!(json["data"]["processed"], true);
    assert_eq!(json["data"]["job"]["job_status"], "pending_payment");
    assert_eq!(app.engine.launch_count(), 0);
}

#[tokio::test]
async fn unknown_identifier_is_acknowledged_without_effect() {
    let app = build_test_app().await;

    let response = app
        .post_json("/webhooks/masumi/payment", json!({"blockchain_identifier": "nope"}))
        .await;
    assert_eq!(response.status(), StatusCode::OK);

    let json = body_json(response).await;
    assert_eq!(json["data"]["processed"], false);
    assert!(json["data"]["job"].is_null());
    assert_eq!(app.engine.launch_count(), 0);
}

#[tokio::test]
async fn repeated_notification_does_not_relaunch() {
    let app = build_test_app().await;
    let started = app.start_job("purchaser-1").await;
    let bid = started["blockchainIdentifier"].as_str().unwrap();

    for _ in 0..2 {
        let response = app
            .post_json("/webhooks/masumi/payment", json!({"blockchain_identifier": bid}))
            .await;
        assert_eq!(response.status(), StatusCode::OK);
    }

    assert_eq!(app.engine.launch_count(), 1);
}

#[tokio::test]
async fn empty_identifier_is_a_bad_request() {
    let app = build_test_app().await;

    let response = app
        .post_json("/webhooks/masumi/payment", json!({"blockchain_identifier": " "}))
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["code"], "BAD_REQUEST");
}
