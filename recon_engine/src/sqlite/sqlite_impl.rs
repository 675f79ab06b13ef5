//! `SqliteDatabase` is the concrete backend for the reconciliation engine.
//!
//! It implements [`PaymentStore`] and [`AuditSink`] by composing the low-level functions in [`super::db`], opening a
//! transaction wherever two writes have to land together.
use std::fmt::Debug;

use chrono::{DateTime, Utc};
use log::*;
use sqlx::{migrate::MigrateError, SqlitePool};

use super::db::{anomalies, audit_log, db_url, failed_events, new_pool, payment_requests, payments};
use crate::{
    db_types::{
        AuditEntry,
        ExternalId,
        FailedEvent,
        NewAuditEntry,
        NewFailedEvent,
        NewPayment,
        NewPaymentAnomaly,
        NewPaymentRequest,
        OrderId,
        Payment,
        PaymentAnomaly,
        PaymentRequest,
    },
    traits::{AuditError, AuditSink, PaymentStore, PaymentStoreError},
};

#[derive(Clone)]
pub struct SqliteDatabase {
    url: String,
    pool: SqlitePool,
}

impl Debug for SqliteDatabase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "SqliteDatabase ({:?})", self.pool)
    }
}

impl SqliteDatabase {
    /// Creates a new database API object using the database URL from `RECON_DATABASE_URL`.
    pub async fn new(max_connections: u32) -> Result<Self, sqlx::Error> {
        let url = db_url();
        SqliteDatabase::new_with_url(url.as_str(), max_connections).await
    }

    pub async fn new_with_url(url: &str, max_connections: u32) -> Result<Self, sqlx::Error> {
        trace!("🗃️ Creating new database connection pool with url {url}");
        let pool = new_pool(url, max_connections).await?;
        Ok(Self { url: url.to_string(), pool })
    }

    pub fn url(&self) -> &str {
        self.url.as_str()
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Brings the schema up to date. Safe to call on every start.
    pub async fn run_migrations(&self) -> Result<(), MigrateError> {
        sqlx::migrate!("./src/sqlite/migrations").run(&self.pool).await?;
        info!("🗃️ Database migrations are up to date");
        Ok(())
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }

    /// The audit trail for the order, oldest entry first.
    pub async fn fetch_audit_entries_for_order(&self, order_id: OrderId) -> Result<Vec<AuditEntry>, sqlx::Error> {
        let mut conn = self.pool.acquire().await?;
        audit_log::fetch_for_order(order_id, &mut conn).await
    }

    pub async fn fetch_payment_request(&self, id: i64) -> Result<Option<PaymentRequest>, PaymentStoreError> {
        let mut conn = self.pool.acquire().await?;
        let request = payment_requests::fetch_payment_request(id, &mut conn).await?;
        Ok(request)
    }
}

fn now() -> DateTime<Utc> {
    Utc::now()
}

impl PaymentStore for SqliteDatabase {
    async fn insert_payment(&self, payment: NewPayment) -> Result<Payment, PaymentStoreError> {
        let mut conn = self.pool.acquire().await?;
        payments::insert_payment(payment, now(), &mut conn).await
    }

    async fn fetch_payment_for_order(&self, order_id: OrderId) -> Result<Option<Payment>, PaymentStoreError> {
        let mut conn = self.pool.acquire().await?;
        let payment = payments::fetch_payment_for_order(order_id, &mut conn).await?;
        Ok(payment)
    }

    async fn fetch_payment_by_external_id(
        &self,
        external_id: &ExternalId,
    ) -> Result<Option<Payment>, PaymentStoreError> {
        let mut conn = self.pool.acquire().await?;
        let payment = payments::fetch_payment_by_external_id(external_id, &mut conn).await?;
        Ok(payment)
    }

    async fn mark_payment_paid(&self, external_id: &ExternalId) -> Result<Option<Payment>, PaymentStoreError> {
        let mut conn = self.pool.acquire().await?;
        let payment = payments::mark_paid(external_id, now(), &mut conn).await?;
        if let Some(p) = &payment {
            debug!("🗃️ Payment [{}] is now PAID", p.external_id);
        }
        Ok(payment)
    }

    async fn fetch_pending_payments_since(&self, since: DateTime<Utc>) -> Result<Vec<Payment>, PaymentStoreError> {
        let mut conn = self.pool.acquire().await?;
        let payments = payments::fetch_pending_since(since, &mut conn).await?;
        Ok(payments)
    }

    async fn expire_overdue_payments(&self, now: DateTime<Utc>) -> Result<Vec<Payment>, PaymentStoreError> {
        let mut conn = self.pool.acquire().await?;
        let expired = payments::expire_overdue(now, &mut conn).await?;
        Ok(expired)
    }

    async fn insert_payment_request(&self, request: NewPaymentRequest) -> Result<PaymentRequest, PaymentStoreError> {
        let mut conn = self.pool.acquire().await?;
        let request = payment_requests::insert_payment_request(request, now(), &mut conn).await?;
        Ok(request)
    }

    async fn fetch_pending_payment_requests(&self, limit: u32) -> Result<Vec<PaymentRequest>, PaymentStoreError> {
        let mut conn = self.pool.acquire().await?;
        let requests = payment_requests::fetch_pending(limit, &mut conn).await?;
        Ok(requests)
    }

    async fn fetch_failed_payment_requests(
        &self,
        limit: u32,
        max_retries: u32,
    ) -> Result<Vec<PaymentRequest>, PaymentStoreError> {
        let mut conn = self.pool.acquire().await?;
        let requests = payment_requests::fetch_failed(limit, max_retries, &mut conn).await?;
        Ok(requests)
    }

    async fn mark_payment_request_processed(&self, id: i64) -> Result<bool, PaymentStoreError> {
        let mut conn = self.pool.acquire().await?;
        let updated = payment_requests::mark_processed(id, now(), &mut conn).await?;
        Ok(updated)
    }

    async fn mark_payment_request_failed(&self, id: i64, notes: &str) -> Result<bool, PaymentStoreError> {
        let mut conn = self.pool.acquire().await?;
        let updated = payment_requests::mark_failed(id, notes, now(), &mut conn).await?;
        Ok(updated)
    }

    async fn requeue_payment_request(&self, id: i64) -> Result<bool, PaymentStoreError> {
        let mut conn = self.pool.acquire().await?;
        let updated = payment_requests::requeue(id, now(), &mut conn).await?;
        Ok(updated)
    }

    /// In a single atomic transaction,
    /// * checks that the request exists,
    /// * stores the new PENDING payment,
    /// * moves the request from PENDING to processed.
    ///
    /// If the request was no longer PENDING, nothing is written.
    async fn complete_payment_request(&self, id: i64, payment: NewPayment) -> Result<Payment, PaymentStoreError> {
        let mut tx = self.pool.begin().await?;
        let ts = now();
        if payment_requests::fetch_payment_request(id, &mut tx).await?.is_none() {
            return Err(PaymentStoreError::PaymentRequestNotFound(id));
        }
        let payment = payments::insert_payment(payment, ts, &mut tx).await?;
        if !payment_requests::mark_processed(id, ts, &mut tx).await? {
            tx.rollback().await?;
            return Err(PaymentStoreError::PaymentRequestNotPending(id));
        }
        tx.commit().await?;
        debug!("🗃️ Payment request {id} completed with payment {}", payment.id);
        Ok(payment)
    }

    async fn insert_payment_anomaly(&self, anomaly: NewPaymentAnomaly) -> Result<PaymentAnomaly, PaymentStoreError> {
        let mut conn = self.pool.acquire().await?;
        let anomaly = anomalies::insert_anomaly(anomaly, now(), &mut conn).await?;
        Ok(anomaly)
    }

    async fn fetch_anomalies_for_order(&self, order_id: OrderId) -> Result<Vec<PaymentAnomaly>, PaymentStoreError> {
        let mut conn = self.pool.acquire().await?;
        let result = anomalies::fetch_for_order(order_id, &mut conn).await?;
        Ok(result)
    }

    async fn resolve_anomaly(&self, id: i64, notes: &str) -> Result<Option<PaymentAnomaly>, PaymentStoreError> {
        let mut conn = self.pool.acquire().await?;
        let result = anomalies::resolve(id, notes, now(), &mut conn).await?;
        Ok(result)
    }

    async fn insert_failed_event(&self, event: NewFailedEvent) -> Result<FailedEvent, PaymentStoreError> {
        let mut conn = self.pool.acquire().await?;
        let event = failed_events::insert_failed_event(event, now(), &mut conn).await?;
        Ok(event)
    }

    async fn fetch_failed_events_for_order(&self, order_id: OrderId) -> Result<Vec<FailedEvent>, PaymentStoreError> {
        let mut conn = self.pool.acquire().await?;
        let result = failed_events::fetch_for_order(order_id, &mut conn).await?;
        Ok(result)
    }

    async fn resolve_failed_event(&self, id: i64, notes: &str) -> Result<Option<FailedEvent>, PaymentStoreError> {
        let mut conn = self.pool.acquire().await?;
        let result = failed_events::resolve(id, notes, now(), &mut conn).await?;
        Ok(result)
    }
}

impl AuditSink for SqliteDatabase {
    async fn append(&self, entry: NewAuditEntry) -> Result<(), AuditError> {
        let mut conn = self.pool.acquire().await?;
        let event = entry.event;
        let id = audit_log::append(entry, now(), &mut conn).await?;
        trace!("📝️ Audit entry {id} ({event:?}) written");
        Ok(())
    }
}
