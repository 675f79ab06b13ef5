use cucumber::given;
use recon_engine::{
    db_types::{AuditActor, NewPayment, NewPaymentRequest, OrderId},
    test_utils::fakes::ScriptedPublisher,
    PaymentStore,
};

use crate::cucumber::{world::ReconSystem, ReconWorld};

#[given("a fresh install")]
async fn fresh_database(world: &mut ReconWorld) {
    let system = ReconSystem::new(ScriptedPublisher::new()).await;
    world.system = Some(system);
}

#[given(expr = "a pending payment for order {int} of {word}")]
async fn pending_payment(world: &mut ReconWorld, order_id: i64, amount: String) {
    let amount = amount.parse().expect("Not a valid amount");
    let expires = chrono::Utc::now() + chrono::Duration::hours(24);
    let payment = NewPayment::new(OrderId(order_id), 1, amount).with_invoice(
        format!("inv-{order_id}"),
        format!("https://checkout.example.com/inv-{order_id}"),
        expires,
    );
    world.system().db.insert_payment(payment).await.expect("Error inserting payment");
}

#[given(expr = "a queued payment request for order {int} of {word}")]
async fn queued_request(world: &mut ReconWorld, order_id: i64, amount: String) {
    let request = NewPaymentRequest {
        order_id: OrderId(order_id),
        user_id: 1,
        amount: amount.parse().expect("Not a valid amount"),
        user_email: None,
        payment_method: "BCA".into(),
    };
    world
        .system()
        .invoices
        .enqueue_payment_request(request, AuditActor::OrderConsumer)
        .await
        .expect("Error queueing payment request");
}

#[given("the event bus is down")]
async fn bus_down(world: &mut ReconWorld) {
    let system = world.system.take().expect("System not initialised");
    world.system = Some(system.with_publisher(ScriptedPublisher::new().always_fail()));
}

#[given(expr = "the event bus fails {int} times")]
async fn bus_flaky(world: &mut ReconWorld, failures: usize) {
    let system = world.system.take().expect("System not initialised");
    world.system = Some(system.with_publisher(ScriptedPublisher::new().fail_next(failures)));
}
