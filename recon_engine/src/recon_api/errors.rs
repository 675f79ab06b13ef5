use thiserror::Error;

use crate::{
    db_types::{Amount, MalformedReference, OrderId, PaymentStatus},
    traits::{GatewayError, PaymentStoreError, PublishError},
};

#[derive(Debug, Clone, Error)]
pub enum SettlementError {
    #[error("No payment exists for order {0}")]
    PaymentNotFound(OrderId),
    #[error("Payment for order {order_id} is {status} and cannot be marked as paid")]
    InvalidStatus { order_id: OrderId, status: PaymentStatus },
    #[error("Could not announce payment for order {order_id}. {source}")]
    PublishFailed { order_id: OrderId, source: PublishError },
    #[error("{0}")]
    StoreError(#[from] PaymentStoreError),
}

#[derive(Debug, Clone, Error)]
pub enum WebhookError {
    #[error("{0}")]
    MalformedReference(#[from] MalformedReference),
    #[error("Amount mismatch for order {order_id}. Expected {expected}, but the gateway reported {reported}")]
    AmountMismatch { order_id: OrderId, expected: Amount, reported: Amount },
    #[error("No payment exists for order {0}")]
    PaymentNotFound(OrderId),
    #[error("{0}")]
    SettlementError(#[from] SettlementError),
    #[error("{0}")]
    StoreError(#[from] PaymentStoreError),
}

#[derive(Debug, Clone, Error)]
pub enum InvoiceError {
    #[error("A payment already exists for order {0}")]
    PaymentAlreadyExists(OrderId),
    #[error("Invoice amount must be positive, but was {0}")]
    InvalidAmount(Amount),
    #[error("Gateway error. {0}")]
    GatewayError(#[from] GatewayError),
    #[error("{0}")]
    StoreError(PaymentStoreError),
}

impl From<PaymentStoreError> for InvoiceError {
    fn from(e: PaymentStoreError) -> Self {
        match e {
            PaymentStoreError::PaymentAlreadyExists(ext) => match ext.order_id() {
                Ok(order_id) => InvoiceError::PaymentAlreadyExists(order_id),
                Err(_) => InvoiceError::StoreError(PaymentStoreError::PaymentAlreadyExists(ext)),
            },
            e => InvoiceError::StoreError(e),
        }
    }
}
