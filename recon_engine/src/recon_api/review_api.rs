use std::fmt::Debug;

use log::*;
use serde_json::json;

use crate::{
    db_types::{AuditActor, AuditEvent, FailedEvent, NewAuditEntry, OrderId, Payment, PaymentAnomaly},
    traits::{audit, AuditSink, PaymentStore, PaymentStoreError},
};

/// Operator access to payments and the quarantine tables.
///
/// Anomalies and failed events are only ever closed from here. Each resolution is audited with the operator as actor.
pub struct ReviewApi<B, A> {
    db: B,
    audit: A,
}

impl<B, A> Debug for ReviewApi<B, A> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "ReviewApi")
    }
}

impl<B: Clone, A: Clone> Clone for ReviewApi<B, A> {
    fn clone(&self) -> Self {
        Self { db: self.db.clone(), audit: self.audit.clone() }
    }
}

impl<B, A> ReviewApi<B, A> {
    pub fn new(db: B, audit: A) -> Self {
        Self { db, audit }
    }
}

impl<B, A> ReviewApi<B, A>
where
    B: PaymentStore,
    A: AuditSink,
{
    pub async fn payment_for_order(&self, order_id: OrderId) -> Result<Option<Payment>, PaymentStoreError> {
        self.db.fetch_payment_for_order(order_id).await
    }

    pub async fn anomalies_for_order(&self, order_id: OrderId) -> Result<Vec<PaymentAnomaly>, PaymentStoreError> {
        self.db.fetch_anomalies_for_order(order_id).await
    }

    pub async fn failed_events_for_order(&self, order_id: OrderId) -> Result<Vec<FailedEvent>, PaymentStoreError> {
        self.db.fetch_failed_events_for_order(order_id).await
    }

    /// Closes an anomaly. Returns `None` if there is no anomaly with this id awaiting review.
    pub async fn resolve_anomaly(&self, id: i64, notes: &str) -> Result<Option<PaymentAnomaly>, PaymentStoreError> {
        let resolved = self.db.resolve_anomaly(id, notes).await?;
        match &resolved {
            Some(anomaly) => {
                info!("🚨️ Anomaly #{id} for order {} was resolved. {notes}", anomaly.order_id);
                let entry = NewAuditEntry::new(anomaly.order_id, AuditEvent::AnomalyResolved, AuditActor::Operator)
                    .with_external_id(anomaly.external_id.clone())
                    .with_metadata(json!({ "anomaly_id": id, "notes": notes }));
                audit(&self.audit, entry).await;
            },
            None => debug!("🚨️ Anomaly #{id} does not exist or has already been resolved"),
        }
        Ok(resolved)
    }

    /// Closes a failed event. Returns `None` if there is no failed event with this id awaiting review.
    pub async fn resolve_failed_event(&self, id: i64, notes: &str) -> Result<Option<FailedEvent>, PaymentStoreError> {
        let resolved = self.db.resolve_failed_event(id, notes).await?;
        match &resolved {
            Some(event) => {
                info!("🚨️ Failed event #{id} for order {} was resolved. {notes}", event.order_id);
                let entry = NewAuditEntry::new(event.order_id, AuditEvent::FailedEventResolved, AuditActor::Operator)
                    .with_external_id(event.external_id.clone())
                    .with_metadata(json!({ "failed_event_id": id, "notes": notes }));
                audit(&self.audit, entry).await;
            },
            None => debug!("🚨️ Failed event #{id} does not exist or has already been resolved"),
        }
        Ok(resolved)
    }
}
