use serde::{Deserialize, Serialize};

use crate::db_types::{Amount, ExternalId, NewPaymentRequest, OrderId, Payment, PaymentAnomaly};

/// The message announced on the event bus once a payment has been confirmed. It is keyed by the order's external id,
/// so that every message for an order lands on the same partition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentSuccessEvent {
    pub order_id: OrderId,
    pub status: String,
}

impl PaymentSuccessEvent {
    pub const STATUS_PAID: &'static str = "paid";

    pub fn new(order_id: OrderId) -> Self {
        Self { order_id, status: Self::STATUS_PAID.to_string() }
    }

    pub fn key(&self) -> ExternalId {
        ExternalId::for_order(self.order_id)
    }
}

/// Inbound message from the order service announcing a new order that needs to be paid for.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderCreatedEvent {
    pub order_id: OrderId,
    pub user_id: i64,
    pub total_amount: Amount,
    #[serde(default)]
    pub payment_method: String,
    #[serde(default)]
    pub shipping_address: Option<String>,
    #[serde(default)]
    pub user_email: Option<String>,
}

impl From<OrderCreatedEvent> for NewPaymentRequest {
    fn from(event: OrderCreatedEvent) -> Self {
        NewPaymentRequest {
            order_id: event.order_id,
            user_id: event.user_id,
            amount: event.total_amount,
            user_email: event.user_email,
            payment_method: event.payment_method,
        }
    }
}

/// In-process notification that a payment has moved to PAID.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaymentPaidEvent {
    pub payment: Payment,
}

impl PaymentPaidEvent {
    pub fn new(payment: Payment) -> Self {
        Self { payment }
    }
}

/// In-process notification that a payment has been quarantined and needs an operator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnomalyDetectedEvent {
    pub anomaly: PaymentAnomaly,
}

impl AnomalyDetectedEvent {
    pub fn new(anomaly: PaymentAnomaly) -> Self {
        Self { anomaly }
    }
}
