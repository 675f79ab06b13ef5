use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::db_types::{
    ExternalId,
    FailedEvent,
    NewFailedEvent,
    NewPayment,
    NewPaymentAnomaly,
    NewPaymentRequest,
    OrderId,
    Payment,
    PaymentAnomaly,
    PaymentRequest,
};

/// The system of record for payments and the quarantine tables around them.
///
/// Every status change is a *conditional* update: the write only happens if the row is still in the expected source
/// status, and the return value says whether it did. Callers never read a status, decide, and write it back. This is
/// what keeps the webhook path and the poll path from both settling the same order.
#[allow(async_fn_in_trait)]
pub trait PaymentStore: Clone {
    /// Stores a new PENDING payment. Fails with [`PaymentStoreError::PaymentAlreadyExists`] if a payment with the same
    /// external id is already on record.
    async fn insert_payment(&self, payment: NewPayment) -> Result<Payment, PaymentStoreError>;

    /// Returns the authoritative (most recent) payment for the order, if any.
    async fn fetch_payment_for_order(&self, order_id: OrderId) -> Result<Option<Payment>, PaymentStoreError>;

    async fn fetch_payment_by_external_id(
        &self,
        external_id: &ExternalId,
    ) -> Result<Option<Payment>, PaymentStoreError>;

    /// Moves the payment from PENDING to PAID. Returns the updated payment, or `None` if the payment was not PENDING
    /// (or does not exist), in which case nothing was written.
    async fn mark_payment_paid(&self, external_id: &ExternalId) -> Result<Option<Payment>, PaymentStoreError>;

    /// Fetches PENDING payments created at or after `since`, oldest first.
    async fn fetch_pending_payments_since(&self, since: DateTime<Utc>) -> Result<Vec<Payment>, PaymentStoreError>;

    /// Moves every PENDING payment whose expiry time is before `now` to EXPIRED, and returns them.
    async fn expire_overdue_payments(&self, now: DateTime<Utc>) -> Result<Vec<Payment>, PaymentStoreError>;

    async fn insert_payment_request(&self, request: NewPaymentRequest) -> Result<PaymentRequest, PaymentStoreError>;

    /// Fetches up to `limit` PENDING requests, oldest first.
    async fn fetch_pending_payment_requests(&self, limit: u32) -> Result<Vec<PaymentRequest>, PaymentStoreError>;

    /// Fetches up to `limit` FAILED requests that are still eligible for another attempt, i.e.
    /// `retry_count <= max_retries`.
    async fn fetch_failed_payment_requests(
        &self,
        limit: u32,
        max_retries: u32,
    ) -> Result<Vec<PaymentRequest>, PaymentStoreError>;

    /// PENDING -> PAID (processed). Returns false if the request was not PENDING.
    async fn mark_payment_request_processed(&self, id: i64) -> Result<bool, PaymentStoreError>;

    /// PENDING -> FAILED, incrementing the retry count and recording `notes`. Returns false if the request was not
    /// PENDING.
    async fn mark_payment_request_failed(&self, id: i64, notes: &str) -> Result<bool, PaymentStoreError>;

    /// FAILED -> PENDING, so that the drain picks the request up again. Returns false if the request was not FAILED.
    async fn requeue_payment_request(&self, id: i64) -> Result<bool, PaymentStoreError>;

    /// In a single atomic transaction, stores the payment for an opened invoice and marks the request as processed.
    async fn complete_payment_request(&self, id: i64, payment: NewPayment) -> Result<Payment, PaymentStoreError>;

    async fn insert_payment_anomaly(&self, anomaly: NewPaymentAnomaly) -> Result<PaymentAnomaly, PaymentStoreError>;

    async fn fetch_anomalies_for_order(&self, order_id: OrderId) -> Result<Vec<PaymentAnomaly>, PaymentStoreError>;

    /// NEEDS_REVIEW -> RESOLVED. Returns `None` if there is no unresolved anomaly with this id.
    async fn resolve_anomaly(&self, id: i64, notes: &str) -> Result<Option<PaymentAnomaly>, PaymentStoreError>;

    async fn insert_failed_event(&self, event: NewFailedEvent) -> Result<FailedEvent, PaymentStoreError>;

    async fn fetch_failed_events_for_order(&self, order_id: OrderId) -> Result<Vec<FailedEvent>, PaymentStoreError>;

    /// NEEDS_REVIEW -> RESOLVED. Returns `None` if there is no unresolved failed event with this id.
    async fn resolve_failed_event(&self, id: i64, notes: &str) -> Result<Option<FailedEvent>, PaymentStoreError>;
}

#[derive(Debug, Clone, Error)]
pub enum PaymentStoreError {
    #[error("We have an internal database engine (configuration/uptime etc.) : {0}")]
    DatabaseError(String),
    #[error("Cannot insert payment, since it already exists with external id {0}")]
    PaymentAlreadyExists(ExternalId),
    #[error("The requested payment request {0} does not exist")]
    PaymentRequestNotFound(i64),
    #[error("Payment request {0} is no longer pending")]
    PaymentRequestNotPending(i64),
}

impl From<sqlx::Error> for PaymentStoreError {
    fn from(e: sqlx::Error) -> Self {
        PaymentStoreError::DatabaseError(e.to_string())
    }
}
