//! Payment loop behaviour driven one cycle at a time.

mod common;

use std::time::Duration;

use assert_matches::assert_matches;
use common::*;
use flowgate_core::status::JobStatus;
use flowgate_masumi::PaymentStatus;
use flowgate_worker::CoordinatorConfig;

#[tokio::test]
async fn confirmed_payment_launches_within_one_cycle() {
    let h = harness().await;
    let mut rx = h.events.subscribe();

    let job = h.service.submit(submission(10_000_000)).await.unwrap();
    assert_eq!(job.status, JobStatus::PendingPayment);
    assert!(job.pay_by_at.is_some());
    let bid = job.blockchain_identifier.clone().expect("payment requested");

    h.gateway.reply_for(&bid, GatewayReply::Status(PaymentStatus::Confirmed));
    let report = h.coordinator.run_payment_cycle().await;
    assert_eq!(report.advanced, 1);

    let job = h.reload(job.id).await;
    assert_eq!(job.status, JobStatus::Starting);
    assert_eq!(job.remote_run_id.as_deref(), Some("run-1"));
    assert!(job.started_at.is_some());

    let path: Vec<_> = drain(&mut rx).iter().map(|e| (e.from, e.to)).collect();
    assert_eq!(
        path,
        vec![
            (None, JobStatus::PendingPayment),
            (Some(JobStatus::PendingPayment), JobStatus::PaymentConfirmed),
            (Some(JobStatus::PaymentConfirmed), JobStatus::Starting),
        ]
    );
}

#[tokio::test]
async fn unconfirmed_payment_waits() {
    let h = harness().await;
    let job = h.service.submit(submission(10_000_000)).await.unwrap();

    let report = h.coordinator.run_payment_cycle().await;

    assert_eq!(report.waiting, 1);
    assert_eq!(h.reload(job.id).await.status, JobStatus::PendingPayment);
    assert_eq!(h.engine.launch_count(), 0);
}

#[tokio::test]
async fn expired_payment_is_terminal_and_never_selected_again() {
    let h = harness().await;
    let job = h.service.submit(submission(10_000_000)).await.unwrap();
    h.gateway.reply_with(GatewayReply::Status(PaymentStatus::Expired));

    h.coordinator.run_payment_cycle().await;

    let expired = h.reload(job.id).await;
    assert_eq!(expired.status, JobStatus::PaymentExpired);
    assert!(expired.error_message.is_some());
    assert!(expired.result_data.is_none());

    let checks_before = h.gateway.status_checks.load(std::sync::atomic::Ordering::SeqCst);
    let report = h.coordinator.run_payment_cycle().await;
    assert_eq!(report.examined, 0);
    assert_eq!(
        h.gateway.status_checks.load(std::sync::atomic::Ordering::SeqCst),
        checks_before
    );
}

#[tokio::test]
async fn pay_by_deadline_expires_job_despite_transport_errors() {
    let h = harness().await;
    let job = h
        .insert(JobStatus::PendingPayment, Some("bid-late"), Some(past(1)), Some(future(60)))
        .await;
    h.gateway.reply_with(GatewayReply::Unreachable);

    let report = h.coordinator.run_payment_cycle().await;

    assert_eq!(report.terminated, 1);
    let job = h.reload(job.id).await;
    assert_eq!(job.status, JobStatus::PaymentExpired);
    assert!(job.error_message.unwrap().contains("pay-by deadline"));
}

#[tokio::test]
async fn transport_error_before_deadline_leaves_record_for_next_cycle() {
    let h = harness().await;
    let job = h.service.submit(submission(10_000_000)).await.unwrap();
    h.gateway.reply_with(GatewayReply::Unreachable);

    let report = h.coordinator.run_payment_cycle().await;
    assert_eq!(report.transport_errors, 1);
    assert_eq!(h.reload(job.id).await.status, JobStatus::PendingPayment);

    h.gateway.reply_with(GatewayReply::Status(PaymentStatus::Confirmed));
    h.coordinator.run_payment_cycle().await;
    assert_eq!(h.reload(job.id).await.status, JobStatus::Starting);
}

#[tokio::test(start_paused = true)]
async fn hung_status_check_times_out_as_transport_error() {
    let h = harness_with(CoordinatorConfig {
        call_timeout: Duration::from_secs(1),
        ..test_config()
    })
    .await;
    let job = h.service.submit(submission(10_000_000)).await.unwrap();
    h.gateway.reply_with(GatewayReply::Hang);

    let report = h.coordinator.run_payment_cycle().await;

    assert_eq!(report.transport_errors, 1);
    assert_eq!(h.reload(job.id).await.status, JobStatus::PendingPayment);
}

#[tokio::test]
async fn launch_failure_after_payment_is_terminal_and_not_retried() {
    let h = harness().await;
    let job = h.service.submit(submission(10_000_000)).await.unwrap();
    h.gateway.reply_with(GatewayReply::Status(PaymentStatus::Confirmed));
    h.engine.fail_launches("input rejected");

    let report = h.coordinator.run_payment_cycle().await;
    assert_eq!(report.terminated, 1);

    let failed = h.reload(job.id).await;
    assert_eq!(failed.status, JobStatus::Failed);
    assert!(failed.remote_run_id.is_none());
    assert!(failed.error_message.unwrap().contains("input rejected"));

    h.coordinator.run_payment_cycle().await;
    h.coordinator.run_execution_cycle().await;
    assert_eq!(h.engine.launch_count(), 1);
}

#[tokio::test]
async fn repeated_cycles_do_not_launch_twice() {
    let h = harness().await;
    let job = h.service.submit(submission(10_000_000)).await.unwrap();
    h.gateway.reply_with(GatewayReply::Status(PaymentStatus::Confirmed));

    h.coordinator.run_payment_cycle().await;
    let once = h.reload(job.id).await;
    h.coordinator.run_payment_cycle().await;
    let twice = h.reload(job.id).await;

    assert_eq!(once.status, twice.status);
    assert_eq!(once.remote_run_id, twice.remote_run_id);
    assert_eq!(h.engine.launch_count(), 1);
}

#[tokio::test]
async fn orphaned_confirmation_is_failed_without_relaunch() {
    let h = harness_with(CoordinatorConfig {
        launch_grace: Duration::ZERO,
        ..test_config()
    })
    .await;
    let job = h
        .insert(JobStatus::PaymentConfirmed, Some("bid-orphan"), Some(future(60)), Some(future(120)))
        .await;
    tokio::time::sleep(Duration::from_millis(5)).await;

    h.coordinator.run_payment_cycle().await;

    let job = h.reload(job.id).await;
    assert_eq!(job.status, JobStatus::Failed);
    assert!(job.error_message.unwrap().contains("launch outcome unknown"));
    assert_eq!(h.engine.launch_count(), 0);
}

#[tokio::test]
async fn webhook_reverifies_with_gateway() {
    let h = harness().await;
    let job = h.service.submit(submission(10_000_000)).await.unwrap();
    let bid = job.blockchain_identifier.clone().unwrap();

    // Gateway still says unpaid: the notification alone changes nothing.
    let after = h.service.confirm_payment(&bid).await.unwrap().unwrap();
    assert_eq!(after.status, JobStatus::PendingPayment);

    h.gateway.reply_for(&bid, GatewayReply::Status(PaymentStatus::Confirmed));
    let after = h.service.confirm_payment(&bid).await.unwrap().unwrap();
    assert_eq!(after.status, JobStatus::Starting);

    // A duplicate notification is a no-op.
    let again = h.service.confirm_payment(&bid).await.unwrap().unwrap();
    assert_eq!(again.status, JobStatus::Starting);
    assert_eq!(h.engine.launch_count(), 1);

    // The next payment cycle has nothing left to do for it.
    let report = h.coordinator.run_payment_cycle().await;
    assert_eq!(report.examined, 0);
}

#[tokio::test]
async fn webhook_for_unknown_identifier_is_ignored() {
    let h = harness().await;
    let result = h.service.confirm_payment("bid-unknown").await;
    assert_matches!(result, Ok(None));
}

#[tokio::test]
async fn cycle_reaches_records_beyond_the_first_page() {
    let h = harness_with(CoordinatorConfig {
        page_size: 3,
        ..test_config()
    })
    .await;
    for n in 0..7 {
        let bid = format!("bid-wait-{n}");
        h.insert(JobStatus::PendingPayment, Some(bid.as_str()), Some(future(60)), None)
            .await;
    }
    // Created last, so they sit on the final page.
    let overdue = h
        .insert(JobStatus::PendingPayment, Some("bid-late"), Some(past(5)), None)
        .await;
    let paid = h
        .insert(JobStatus::PendingPayment, Some("bid-paid"), Some(future(60)), None)
        .await;
    h.gateway
        .reply_for("bid-paid", GatewayReply::Status(PaymentStatus::Confirmed));

    let report = h.coordinator.run_payment_cycle().await;

    assert_eq!(report.examined, 9);
    assert_eq!(report.waiting, 7);
    assert_eq!(report.terminated, 1);
    assert_eq!(report.advanced, 1);
    assert_eq!(h.reload(overdue.id).await.status, JobStatus::PaymentExpired);
    assert_eq!(h.reload(paid.id).await.status, JobStatus::Starting);
    assert_eq!(h.gateway.status_checks.load(std::sync::atomic::Ordering::SeqCst), 9);
}

#[tokio::test]
async fn unreachable_check_does_not_hold_back_other_records() {
    let h = harness_with(CoordinatorConfig {
        page_size: 2,
        max_concurrent_checks: 2,
        ..test_config()
    })
    .await;
    let down = h
        .insert(JobStatus::PendingPayment, Some("bid-down"), Some(future(60)), None)
        .await;
    for n in 0..3 {
        let bid = format!("bid-wait-{n}");
        h.insert(JobStatus::PendingPayment, Some(bid.as_str()), Some(future(60)), None)
            .await;
    }
    let paid = h
        .insert(JobStatus::PendingPayment, Some("bid-paid"), Some(future(60)), None)
        .await;
    h.gateway.reply_for("bid-down", GatewayReply::Unreachable);
    h.gateway
        .reply_for("bid-paid", GatewayReply::Status(PaymentStatus::Confirmed));

    let report = h.coordinator.run_payment_cycle().await;

    assert_eq!(report.examined, 5);
    assert_eq!(report.transport_errors, 1);
    assert_eq!(report.advanced, 1);
    assert_eq!(report.waiting, 3);
    assert_eq!(h.reload(down.id).await.status, JobStatus::PendingPayment);
    assert_eq!(h.reload(paid.id).await.status, JobStatus::Starting);
    assert_eq!(h.engine.launch_count(), 1);

    // The failed check is retried on the next cycle.
    h.gateway
        .reply_for("bid-down", GatewayReply::Status(PaymentStatus::Confirmed));
    let report = h.coordinator.run_payment_cycle().await;
    assert_eq!(report.advanced, 1);
    assert_eq!(h.reload(down.id).await.status, JobStatus::Starting);
}
