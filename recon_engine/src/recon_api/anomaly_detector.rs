use log::*;
use serde_json::json;

use crate::{
    db_types::{Amount, AnomalyType, AuditActor, AuditEvent, NewAuditEntry, NewPaymentAnomaly, Payment, PaymentAnomaly},
    events::{AnomalyDetectedEvent, EventProducers},
    traits::{audit, AuditSink, PaymentStore, PaymentStoreError},
};

/// True when the gateway reported an amount, and it differs from the invoiced amount.
///
/// A missing or zero reported amount means "not provided" and is never a mismatch. Comparison is exact decimal
/// equality, so `100` and `100.00` agree, but `100.00` and `100.01` do not.
pub fn is_amount_mismatch(expected: Amount, reported: Option<Amount>) -> bool {
    match reported {
        Some(reported) if !reported.is_zero() => reported != expected,
        _ => false,
    }
}

/// Quarantines payments whose confirmed amount disagrees with the invoice. It never corrects anything.
pub struct AnomalyDetector<B, A> {
    db: B,
    audit: A,
    producers: EventProducers,
}

impl<B: Clone, A: Clone> Clone for AnomalyDetector<B, A> {
    fn clone(&self) -> Self {
        Self { db: self.db.clone(), audit: self.audit.clone(), producers: self.producers.clone() }
    }
}

impl<B, A> AnomalyDetector<B, A> {
    pub fn new(db: B, audit: A) -> Self {
        Self { db, audit, producers: EventProducers::default() }
    }

    pub fn with_producers(mut self, producers: EventProducers) -> Self {
        self.producers = producers;
        self
    }
}

impl<B, A> AnomalyDetector<B, A>
where
    B: PaymentStore,
    A: AuditSink,
{
    /// Stores a [`PaymentAnomaly`] for the payment, audits it and notifies the anomaly hook.
    pub async fn record_amount_mismatch(
        &self,
        payment: &Payment,
        reported: Amount,
        actor: AuditActor,
    ) -> Result<PaymentAnomaly, PaymentStoreError> {
        let notes = format!("amount mismatch: expected={}, got={}", payment.amount, reported);
        warn!("🚨️ Order {}: {notes}", payment.order_id);
        let anomaly = NewPaymentAnomaly {
            order_id: payment.order_id,
            external_id: payment.external_id.clone(),
            anomaly_type: AnomalyType::InvalidAmount,
            notes,
        };
        let anomaly = self.db.insert_payment_anomaly(anomaly).await?;
        let entry = NewAuditEntry::for_payment(payment, AuditEvent::PaymentAnomalyDetected, actor).with_metadata(
            json!({ "anomaly_id": anomaly.id, "expected": payment.amount, "reported": reported }),
        );
        audit(&self.audit, entry).await;
        self.producers.anomaly_detected(AnomalyDetectedEvent::new(anomaly.clone())).await;
        Ok(anomaly)
    }
}
