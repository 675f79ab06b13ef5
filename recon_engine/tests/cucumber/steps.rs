use std::time::Duration;

use cucumber::{then, when};
use recon_engine::{
    db_types::{AuditEvent, OrderId, PaymentStatus},
    traits::InvoiceStatus,
    PaymentStore,
    WebhookError,
    WebhookOutcome,
    WebhookPayload,
};

use crate::cucumber::ReconWorld;

#[when(expr = "the gateway sends a {word} notification for {string} with amount {word}")]
async fn notification_with_amount(world: &mut ReconWorld, status: String, reference: String, amount: String) {
    let amount = amount.parse().expect("Not a valid amount");
    let payload = WebhookPayload::new(reference, status, Some(amount));
    let result = world.system().webhooks.handle_notification(payload).await;
    world.last_notification = Some(result);
}

#[when(expr = "the gateway sends a {word} notification for {string}")]
async fn notification(world: &mut ReconWorld, status: String, reference: String) {
    let payload = WebhookPayload::new(reference, status, None);
    let result = world.system().webhooks.handle_notification(payload).await;
    world.last_notification = Some(result);
}

#[when(expr = "the gateway reports order {int} as {word}")]
async fn gateway_reports(world: &mut ReconWorld, order_id: i64, status: String) {
    world.system().gateway.set_status(OrderId(order_id), InvoiceStatus::from(status.as_str()));
}

#[when("the pending invoice poll runs")]
async fn poll_runs(world: &mut ReconWorld) {
    let lookback = Duration::from_secs(24 * 3600);
    world.system().reconciliation.reconcile_pending_invoices(lookback).await.expect("Poll failed");
}

#[when("the payment request drain runs")]
async fn drain_runs(world: &mut ReconWorld) {
    world.system().invoices.drain_payment_requests(5).await.expect("Drain failed");
}

#[then(expr = "the notification is {word}")]
async fn notification_outcome(world: &mut ReconWorld, outcome: String) {
    let result = world.last_notification.as_ref().expect("No notification was sent");
    let matched = match (outcome.as_str(), result) {
        ("settled", Ok(WebhookOutcome::Settled(_))) => true,
        ("a_duplicate", Ok(WebhookOutcome::AlreadyPaid(_))) => true,
        ("ignored", Ok(WebhookOutcome::Ignored(..))) => true,
        ("unrecognized", Ok(WebhookOutcome::Unrecognized(..))) => true,
        ("malformed", Err(WebhookError::MalformedReference(_))) => true,
        ("a_mismatch", Err(WebhookError::AmountMismatch { .. })) => true,
        ("a_publish_failure", Err(WebhookError::SettlementError(_))) => true,
        _ => false,
    };
    assert!(matched, "Expected the notification to be {outcome}, but got {result:?}");
}

#[then(expr = "the payment for order {int} is {word}")]
async fn payment_status(world: &mut ReconWorld, order_id: i64, status: String) {
    let expected: PaymentStatus = status.parse().expect("Not a valid payment status");
    let payment = world.system().db.fetch_payment_for_order(OrderId(order_id)).await.unwrap();
    let payment = payment.expect("Payment does not exist");
    assert_eq!(payment.status, expected);
}

#[then(expr = "there is {int} payment for order {int}")]
async fn payment_count(world: &mut ReconWorld, count: i64, order_id: i64) {
    let db = &world.system().db;
    let n: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM payments WHERE order_id = $1")
        .bind(order_id)
        .fetch_one(db.pool())
        .await
        .unwrap();
    assert_eq!(n, count);
}

#[then(expr = "{int} success event(s) was/were published")]
async fn published_count(world: &mut ReconWorld, count: usize) {
    assert_eq!(world.system().publisher.published().len(), count);
}

#[then(expr = "order {int} has {int} anomaly/anomalies awaiting review")]
async fn anomaly_count(world: &mut ReconWorld, order_id: i64, count: usize) {
    let anomalies = world.system().db.fetch_anomalies_for_order(OrderId(order_id)).await.unwrap();
    assert_eq!(anomalies.len(), count);
}

#[then(expr = "order {int} has {int} failed event(s) awaiting review")]
async fn failed_event_count(world: &mut ReconWorld, order_id: i64, count: usize) {
    let failed = world.system().db.fetch_failed_events_for_order(OrderId(order_id)).await.unwrap();
    assert_eq!(failed.len(), count);
}

#[then(expr = "the audit trail for order {int} reads {string}")]
async fn audit_trail(world: &mut ReconWorld, order_id: i64, trail: String) {
    let expected = trail
        .split(',')
        .map(|s| serde_json::from_str::<AuditEvent>(&format!("\"{}\"", s.trim())).expect("Not an audit event"))
        .collect::<Vec<_>>();
    let entries = world.system().db.fetch_audit_entries_for_order(OrderId(order_id)).await.unwrap();
    let actual = entries.into_iter().map(|e| e.event).collect::<Vec<_>>();
    assert_eq!(actual, expected);
}
