use recon_engine::{
    db_types::{AuditActor, AuditEvent, NewPaymentRequest, OrderId, PaymentRequestStatus, PaymentStatus},
    events::OrderCreatedEvent,
    test_utils::{fakes::FakeGateway, prepare_env::drop_test_database},
    InvoiceApi,
    InvoiceError,
    OrderIntakeOutcome,
    PaymentStore,
    SqliteDatabase,
};

mod support;
use support::*;

type TestInvoiceApi = InvoiceApi<SqliteDatabase, FakeGateway, Option<SqliteDatabase>>;

fn invoice_api(db: &SqliteDatabase, gateway: &FakeGateway) -> TestInvoiceApi {
    InvoiceApi::new(db.clone(), gateway.clone(), Some(db.clone()))
}

fn request(order_id: i64, value: &str) -> NewPaymentRequest {
    NewPaymentRequest {
        order_id: OrderId(order_id),
        user_id: 500 + order_id,
        amount: amount(value),
        user_email: Some(format!("buyer{order_id}@example.com")),
        payment_method: "BCA".into(),
    }
}

async fn request_status(db: &SqliteDatabase, id: i64) -> (PaymentRequestStatus, i64) {
    let r = db.fetch_payment_request(id).await.unwrap().expect("Payment request is missing");
    (r.status, r.retry_count)
}

#[tokio::test]
async fn drain_skips_orders_that_already_have_a_payment() {
    let db = setup().await;
    let gateway = FakeGateway::new();
    let api = invoice_api(&db, &gateway);
    seed_payment(&db, 42, "100").await;
    let queued = api.enqueue_payment_request(request(42, "100"), AuditActor::OrderConsumer).await.unwrap();

    let result = api.drain_payment_requests(5).await.unwrap();
    assert_eq!(result.skipped, 1);
    assert!(result.created.is_empty());
    assert!(gateway.created_invoices().is_empty());
    assert_eq!(request_status(&db, queued.id).await.0, PaymentRequestStatus::Paid);
    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM payments WHERE external_id = 'order-42'")
        .fetch_one(db.pool())
        .await
        .unwrap();
    assert_eq!(count, 1);
    assert_eq!(audit_events(&db, 42).await, vec![AuditEvent::PaymentRequestCreated, AuditEvent::PaymentRequestSkipped]);
    drop_test_database(db).await;
}

#[tokio::test]
async fn drain_opens_invoices_oldest_first() {
    let db = setup().await;
    let gateway = FakeGateway::new();
    let api = invoice_api(&db, &gateway);
    for order in 1..=7 {
        api.enqueue_payment_request(request(order, "10"), AuditActor::OrderConsumer).await.unwrap();
    }

    let result = api.drain_payment_requests(5).await.unwrap();
    assert_eq!(result.created.len(), 5);
    let orders = result.created.iter().map(|p| p.order_id.value()).collect::<Vec<_>>();
    assert_eq!(orders, vec![1, 2, 3, 4, 5]);
    let payment = &result.created[0];
    assert_eq!(payment.status, PaymentStatus::Pending);
    assert_eq!(payment.invoice_id.as_deref(), Some("inv-1"));
    assert!(payment.expires_at.is_some());
    let sent = gateway.created_invoices();
    assert_eq!(sent[0].description, "Payment for order 1");
    assert_eq!(sent[0].payer_email.as_deref(), Some("buyer1@example.com"));

    let result = api.drain_payment_requests(5).await.unwrap();
    assert_eq!(result.created.len(), 2);
    assert!(api.drain_payment_requests(5).await.unwrap().is_empty());
    drop_test_database(db).await;
}

#[tokio::test]
async fn gateway_failure_marks_request_failed() {
    let db = setup().await;
    let gateway = FakeGateway::new();
    gateway.reject_order(OrderId(3));
    let api = invoice_api(&db, &gateway);
    let ok = api.enqueue_payment_request(request(2, "10"), AuditActor::OrderConsumer).await.unwrap();
    let bad = api.enqueue_payment_request(request(3, "10"), AuditActor::OrderConsumer).await.unwrap();

    let result = api.drain_payment_requests(5).await.unwrap();
    assert_eq!(result.created.len(), 1);
    assert_eq!(result.failed, 1);
    assert_eq!(request_status(&db, ok.id).await, (PaymentRequestStatus::Paid, 0));
    assert_eq!(request_status(&db, bad.id).await, (PaymentRequestStatus::Failed, 1));
    let failed = db.fetch_payment_request(bad.id).await.unwrap().unwrap();
    assert!(failed.notes.unwrap_or_default().contains("API_VALIDATION_ERROR"));
    assert!(db.fetch_payment_for_order(OrderId(3)).await.unwrap().is_none());
    assert_eq!(audit_events(&db, 3).await, vec![
        AuditEvent::PaymentRequestCreated,
        AuditEvent::InvoiceCreationFailed
    ]);
    drop_test_database(db).await;
}

#[tokio::test]
async fn retry_ceiling_boundary() {
    let db = setup().await;
    let gateway = FakeGateway::new();
    let api = invoice_api(&db, &gateway);
    let at_ceiling = api.enqueue_payment_request(request(3, "10"), AuditActor::OrderConsumer).await.unwrap();
    let beyond = api.enqueue_payment_request(request(4, "10"), AuditActor::OrderConsumer).await.unwrap();
    for (id, retries) in [(at_ceiling.id, 3), (beyond.id, 4)] {
        sqlx::query("UPDATE payment_requests SET status = 'FAILED', retry_count = $1 WHERE id = $2")
            .bind(retries)
            .bind(id)
            .execute(db.pool())
            .await
            .unwrap();
    }

    let eligible = db.fetch_failed_payment_requests(10, 3).await.unwrap();
    let ids = eligible.iter().map(|r| r.id).collect::<Vec<_>>();
    assert_eq!(ids, vec![at_ceiling.id]);

    let requeued = api.requeue_failed_payment_requests(10, 3).await.unwrap();
    assert_eq!(requeued.len(), 1);
    assert_eq!(request_status(&db, at_ceiling.id).await, (PaymentRequestStatus::Pending, 3));
    assert_eq!(request_status(&db, beyond.id).await, (PaymentRequestStatus::Failed, 4));
    drop_test_database(db).await;
}

#[tokio::test]
async fn retry_count_never_decreases() {
    let db = setup().await;
    let api = invoice_api(&db, &FakeGateway::new());
    let r = api.enqueue_payment_request(request(9, "10"), AuditActor::OrderConsumer).await.unwrap();
    sqlx::query("UPDATE payment_requests SET retry_count = 2 WHERE id = $1").bind(r.id).execute(db.pool()).await.unwrap();
    let res = sqlx::query("UPDATE payment_requests SET retry_count = 1 WHERE id = $1").bind(r.id).execute(db.pool()).await;
    assert!(res.is_err());
    drop_test_database(db).await;
}

#[tokio::test]
async fn direct_invoice_creation_refuses_duplicates() {
    let db = setup().await;
    let gateway = FakeGateway::new();
    let api = invoice_api(&db, &gateway);

    let payment = api.create_invoice(&request(20, "99.95"), AuditActor::PaymentService).await.unwrap();
    assert_eq!(payment.external_id.as_str(), "order-20");
    assert_eq!(payment.amount, amount("99.95"));
    let err = api.create_invoice(&request(20, "99.95"), AuditActor::PaymentService).await.unwrap_err();
    assert!(matches!(err, InvoiceError::PaymentAlreadyExists(OrderId(20))));
    assert_eq!(gateway.created_invoices().len(), 1);

    let err = api.create_invoice(&request(21, "0"), AuditActor::PaymentService).await.unwrap_err();
    assert!(matches!(err, InvoiceError::InvalidAmount(_)));
    assert_eq!(audit_events(&db, 20).await, vec![AuditEvent::InvoiceCreated]);
    drop_test_database(db).await;
}

#[tokio::test]
async fn order_intake_honours_the_toggle() {
    let db = setup().await;
    let gateway = FakeGateway::new();
    let event = |order_id: i64| OrderCreatedEvent {
        order_id: OrderId(order_id),
        user_id: 1,
        total_amount: amount("120000"),
        payment_method: "OVO".into(),
        shipping_address: Some("Jl. Sudirman 10".into()),
        user_email: None,
    };

    let direct = invoice_api(&db, &gateway);
    let outcome = direct.handle_order_created(event(30)).await.unwrap();
    assert!(matches!(outcome, OrderIntakeOutcome::InvoiceCreated(ref p) if p.order_id == OrderId(30)));

    let deferred = invoice_api(&db, &gateway).with_deferred_invoice_creation(true);
    let outcome = deferred.handle_order_created(event(31)).await.unwrap();
    assert!(matches!(outcome, OrderIntakeOutcome::Queued(ref r) if r.status == PaymentRequestStatus::Pending));
    assert!(db.fetch_payment_for_order(OrderId(31)).await.unwrap().is_none());
    assert_eq!(gateway.created_invoices().len(), 1);
    drop_test_database(db).await;
}
