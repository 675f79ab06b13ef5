#![allow(dead_code)]
use std::time::Duration;

use recon_engine::{
    db_types::{Amount, AuditEvent, NewPayment, OrderId, Payment},
    helpers::RetryPolicy,
    test_utils::{
        fakes::{FakeGateway, ScriptedPublisher},
        prepare_env::new_test_database,
    },
    PaymentStore,
    SettlementApi,
    SqliteDatabase,
};

pub type TestSettlement = SettlementApi<SqliteDatabase, ScriptedPublisher, Option<SqliteDatabase>>;

pub async fn setup() -> SqliteDatabase {
    new_test_database().await
}

/// Retries on a millisecond time unit so that exhausting the budget does not slow the suite down.
pub fn fast_retry() -> RetryPolicy {
    RetryPolicy::new(3, Duration::from_millis(1))
}

pub fn settlement(db: &SqliteDatabase, publisher: &ScriptedPublisher) -> TestSettlement {
    SettlementApi::new(db.clone(), publisher.clone(), Some(db.clone())).with_retry_policy(fast_retry())
}

pub fn amount(s: &str) -> Amount {
    s.parse().expect("Not a valid amount")
}

/// Stores a PENDING payment with an invoice that expires in a day.
pub async fn seed_payment(db: &SqliteDatabase, order_id: i64, value: &str) -> Payment {
    let expires = chrono::Utc::now() + chrono::Duration::hours(24);
    let payment = NewPayment::new(OrderId(order_id), 1000 + order_id, amount(value))
        .with_payment_method("BCA")
        .with_invoice(format!("inv-{order_id}"), format!("https://checkout.example.com/inv-{order_id}"), expires);
    db.insert_payment(payment).await.expect("Error inserting payment")
}

pub async fn audit_events(db: &SqliteDatabase, order_id: i64) -> Vec<AuditEvent> {
    db.fetch_audit_entries_for_order(OrderId(order_id))
        .await
        .expect("Error fetching audit log")
        .into_iter()
        .map(|e| e.event)
        .collect()
}

pub fn gateway() -> FakeGateway {
    FakeGateway::new()
}
