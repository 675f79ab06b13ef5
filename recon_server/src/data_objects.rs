use std::fmt::Display;

use recon_engine::{
    db_types::{Payment, PaymentRequest, PaymentStatus},
    OrderIntakeOutcome,
};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageResponse {
    pub message: String,
}

impl MessageResponse {
    pub fn new<S: Display>(message: S) -> Self {
        Self { message: message.to_string() }
    }
}

/// The invoice details returned to the caller after a direct invoice creation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InvoiceResponse {
    pub id: String,
    pub invoice_url: String,
    pub status: PaymentStatus,
}

impl From<Payment> for InvoiceResponse {
    fn from(payment: Payment) -> Self {
        Self {
            id: payment.invoice_id.unwrap_or_default(),
            invoice_url: payment.invoice_url.unwrap_or_default(),
            status: payment.status,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum OrderIntakeResponse {
    Queued { payment_request: PaymentRequest },
    InvoiceCreated { invoice: InvoiceResponse },
}

impl From<OrderIntakeOutcome> for OrderIntakeResponse {
    fn from(outcome: OrderIntakeOutcome) -> Self {
        match outcome {
            OrderIntakeOutcome::Queued(payment_request) => Self::Queued { payment_request },
            OrderIntakeOutcome::InvoiceCreated(payment) => Self::InvoiceCreated { invoice: payment.into() },
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResolveParams {
    pub notes: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RetryFailedParams {
    /// Maximum number of requests to requeue. Defaults to the drain batch size.
    #[serde(default)]
    pub limit: Option<u32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryFailedResponse {
    pub requeued: Vec<PaymentRequest>,
}
