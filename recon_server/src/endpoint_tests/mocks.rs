use chrono::{DateTime, Utc};
use mockall::mock;
use recon_engine::{
    db_types::{
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
    },
    traits::{PaymentStore, PaymentStoreError},
};

mock! {
    pub PaymentBackend {}
    impl Clone for PaymentBackend {
        fn clone(&self) -> Self;
    }
    impl PaymentStore for PaymentBackend {
        async fn insert_payment(&self, payment: NewPayment) -> Result<Payment, PaymentStoreError>;
        async fn fetch_payment_for_order(&self, order_id: OrderId) -> Result<Option<Payment>, PaymentStoreError>;
        async fn fetch_payment_by_external_id(&self, external_id: &ExternalId) -> Result<Option<Payment>, PaymentStoreError>;
        async fn mark_payment_paid(&self, external_id: &ExternalId) -> Result<Option<Payment>, PaymentStoreError>;
        async fn fetch_pending_payments_since(&self, since: DateTime<Utc>) -> Result<Vec<Payment>, PaymentStoreError>;
        async fn expire_overdue_payments(&self, now: DateTime<Utc>) -> Result<Vec<Payment>, PaymentStoreError>;
        async fn insert_payment_request(&self, request: NewPaymentRequest) -> Result<PaymentRequest, PaymentStoreError>;
        async fn fetch_pending_payment_requests(&self, limit: u32) -> Result<Vec<PaymentRequest>, PaymentStoreError>;
        async fn fetch_failed_payment_requests(&self, limit: u32, max_retries: u32) -> Result<Vec<PaymentRequest>, PaymentStoreError>;
        async fn mark_payment_request_processed(&self, id: i64) -> Result<bool, PaymentStoreError>;
        async fn mark_payment_request_failed(&self, id: i64, notes: &str) -> Result<bool, PaymentStoreError>;
        async fn requeue_payment_request(&self, id: i64) -> Result<bool, PaymentStoreError>;
        async fn complete_payment_request(&self, id: i64, payment: NewPayment) -> Result<Payment, PaymentStoreError>;
        async fn insert_payment_anomaly(&self, anomaly: NewPaymentAnomaly) -> Result<PaymentAnomaly, PaymentStoreError>;
        async fn fetch_anomalies_for_order(&self, order_id: OrderId) -> Result<Vec<PaymentAnomaly>, PaymentStoreError>;
        async fn resolve_anomaly(&self, id: i64, notes: &str) -> Result<Option<PaymentAnomaly>, PaymentStoreError>;
        async fn insert_failed_event(&self, event: NewFailedEvent) -> Result<FailedEvent, PaymentStoreError>;
        async fn fetch_failed_events_for_order(&self, order_id: OrderId) -> Result<Vec<FailedEvent>, PaymentStoreError>;
        async fn resolve_failed_event(&self, id: i64, notes: &str) -> Result<Option<FailedEvent>, PaymentStoreError>;
    }
}
