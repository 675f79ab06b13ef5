use std::fmt::Debug;

use log::*;
use serde_json::json;

use crate::{
    db_types::{
        AnomalyType,
        AuditActor,
        AuditEvent,
        FailedEventType,
        NewAuditEntry,
        NewFailedEvent,
        NewPaymentAnomaly,
        OrderId,
        Payment,
        PaymentStatus,
    },
    events::{AnomalyDetectedEvent, EventProducers, PaymentPaidEvent, PaymentSuccessEvent},
    helpers::{retry_with_backoff, RetryPolicy},
    recon_api::errors::SettlementError,
    traits::{audit, AuditSink, EventPublisher, PaymentStore, PublishError},
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SettlementOutcome {
    /// The payment was PAID before this call. Nothing was published or written.
    AlreadyPaid(Payment),
    /// The success event was published and the payment moved to PAID.
    MarkedPaid(Payment),
}

impl SettlementOutcome {
    pub fn payment(&self) -> &Payment {
        match self {
            SettlementOutcome::AlreadyPaid(p) | SettlementOutcome::MarkedPaid(p) => p,
        }
    }
}

/// `SettlementApi` owns the single path by which a payment becomes PAID. Both the webhook processor and the
/// pending-invoice poll go through [`SettlementApi::settle`].
///
/// The order of operations is: idempotency check, publish the success event (with retries), then the conditional
/// PENDING -> PAID update. If publishing fails after every retry, a [`crate::db_types::FailedEvent`] is stored and the
/// payment stays PENDING, so that a later reconciliation cycle retries the whole transition.
pub struct SettlementApi<B, P, A> {
    db: B,
    publisher: P,
    audit: A,
    retry: RetryPolicy,
    producers: EventProducers,
}

impl<B, P, A> Debug for SettlementApi<B, P, A> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "SettlementApi ({:?})", self.retry)
    }
}

impl<B: Clone, P: Clone, A: Clone> Clone for SettlementApi<B, P, A> {
    fn clone(&self) -> Self {
        Self {
            db: self.db.clone(),
            publisher: self.publisher.clone(),
            audit: self.audit.clone(),
            retry: self.retry,
            producers: self.producers.clone(),
        }
    }
}

impl<B, P, A> SettlementApi<B, P, A> {
    pub fn new(db: B, publisher: P, audit: A) -> Self {
        Self { db, publisher, audit, retry: RetryPolicy::default(), producers: EventProducers::default() }
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_producers(mut self, producers: EventProducers) -> Self {
        self.producers = producers;
        self
    }

    pub fn db(&self) -> &B {
        &self.db
    }

    pub fn audit_sink(&self) -> &A {
        &self.audit
    }

    pub fn producers(&self) -> &EventProducers {
        &self.producers
    }
}

impl<B, P, A> SettlementApi<B, P, A>
where
    B: PaymentStore,
    P: EventPublisher,
    A: AuditSink,
{
    /// Looks up the payment for `order_id` and settles it.
    pub async fn mark_paid(&self, order_id: OrderId, actor: AuditActor) -> Result<SettlementOutcome, SettlementError> {
        let payment =
            self.db.fetch_payment_for_order(order_id).await?.ok_or(SettlementError::PaymentNotFound(order_id))?;
        self.transition(payment, actor).await
    }

    /// Drives the payment in `snapshot` to PAID. The snapshot only identifies the payment. Its row is read again
    /// before anything is published, so a payment settled by another path since the snapshot was taken is reported
    /// as [`SettlementOutcome::AlreadyPaid`] and no second success event goes out.
    pub async fn settle(&self, snapshot: Payment, actor: AuditActor) -> Result<SettlementOutcome, SettlementError> {
        let payment = self
            .db
            .fetch_payment_by_external_id(&snapshot.external_id)
            .await?
            .ok_or(SettlementError::PaymentNotFound(snapshot.order_id))?;
        self.transition(payment, actor).await
    }

    /// `payment` must be fresh from the store.
    async fn transition(&self, payment: Payment, actor: AuditActor) -> Result<SettlementOutcome, SettlementError> {
        let order_id = payment.order_id;
        match payment.status {
            PaymentStatus::Paid => {
                debug!("🔄️ Payment for order {order_id} is already PAID. Nothing to do.");
                return Ok(SettlementOutcome::AlreadyPaid(payment));
            },
            PaymentStatus::Expired | PaymentStatus::Failed => {
                warn!("🔄️ Payment for order {order_id} is {} and cannot be marked as paid", payment.status);
                self.record_status_conflict(&payment, actor).await;
                return Err(SettlementError::InvalidStatus { order_id, status: payment.status });
            },
            PaymentStatus::Pending => {},
        }
        let event = PaymentSuccessEvent::new(order_id);
        if let Err(e) = self.publish(&event).await {
            self.record_failed_publish(&payment, &e, actor).await;
            return Err(SettlementError::PublishFailed { order_id, source: e });
        }
        match self.db.mark_payment_paid(&payment.external_id).await? {
            Some(paid) => {
                info!("🔄️ Payment for order {order_id} is PAID");
                let entry = NewAuditEntry::for_payment(&paid, AuditEvent::MarkPaid, actor)
                    .with_metadata(json!({ "amount": paid.amount }));
                audit(&self.audit, entry).await;
                self.producers.payment_paid(PaymentPaidEvent::new(paid.clone())).await;
                Ok(SettlementOutcome::MarkedPaid(paid))
            },
            None => self.lost_race(order_id).await,
        }
    }

    async fn publish(&self, event: &PaymentSuccessEvent) -> Result<(), PublishError> {
        let publisher = &self.publisher;
        let label = format!("Publishing payment success for order {}", event.order_id);
        retry_with_backoff(&self.retry, &label, move || publisher.publish_payment_success(event)).await
    }

    async fn record_failed_publish(&self, payment: &Payment, error: &PublishError, actor: AuditActor) {
        let order_id = payment.order_id;
        error!("🔄️ Payment success for order {order_id} could not be published. Recording a failed event. {error}");
        let failed = NewFailedEvent {
            order_id,
            external_id: payment.external_id.clone(),
            failed_type: FailedEventType::PublishPaymentSuccess,
            notes: error.to_string(),
        };
        if let Err(e) = self.db.insert_failed_event(failed).await {
            error!("🔄️ Could not store the failed event for order {order_id}. It needs manual attention. {e}");
        }
        let entry = NewAuditEntry::for_payment(payment, AuditEvent::FailedPublishEvent, actor)
            .with_metadata(json!({ "error": error.to_string(), "attempts": self.retry.max_attempts }));
        audit(&self.audit, entry).await;
    }

    /// Money arrived for a payment we had already given up on. The payment is left as it is and an anomaly is
    /// stored for an operator to refund or reinstate it.
    async fn record_status_conflict(&self, payment: &Payment, actor: AuditActor) {
        let order_id = payment.order_id;
        let notes = format!("paid after the payment was {}", payment.status);
        let anomaly = NewPaymentAnomaly {
            order_id,
            external_id: payment.external_id.clone(),
            anomaly_type: AnomalyType::PaidAfterClose,
            notes,
        };
        let anomaly = match self.db.insert_payment_anomaly(anomaly).await {
            Ok(anomaly) => Some(anomaly),
            Err(e) => {
                error!("🔄️ Could not store the anomaly for order {order_id}. It needs manual attention. {e}");
                None
            },
        };
        let entry = NewAuditEntry::for_payment(payment, AuditEvent::PaymentStatusConflict, actor)
            .with_metadata(json!({ "status": payment.status, "anomaly_id": anomaly.as_ref().map(|a| a.id) }));
        audit(&self.audit, entry).await;
        if let Some(anomaly) = anomaly {
            self.producers.anomaly_detected(AnomalyDetectedEvent::new(anomaly)).await;
        }
    }

    /// The conditional update matched nothing, so someone else changed the payment after our snapshot was taken.
    async fn lost_race(&self, order_id: OrderId) -> Result<SettlementOutcome, SettlementError> {
        let current =
            self.db.fetch_payment_for_order(order_id).await?.ok_or(SettlementError::PaymentNotFound(order_id))?;
        match current.status {
            PaymentStatus::Paid => {
                warn!("🔄️ Payment for order {order_id} was marked PAID concurrently. The success event went out twice.");
                Ok(SettlementOutcome::AlreadyPaid(current))
            },
            status => Err(SettlementError::InvalidStatus { order_id, status }),
        }
    }
}
