use std::fmt::Debug;

use log::*;
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::{
    db_types::{parse_order_id, Amount, AuditActor, AuditEvent, NewAuditEntry, OrderId, Payment, PaymentStatus},
    recon_api::{
        anomaly_detector::{is_amount_mismatch, AnomalyDetector},
        errors::WebhookError,
        settlement_api::{SettlementApi, SettlementOutcome},
    },
    traits::{audit, AuditSink, EventPublisher, PaymentStore},
};

const ACTOR: AuditActor = AuditActor::WebhookHandler;

/// Invoice status notification pushed by the payment gateway.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WebhookPayload {
    pub external_id: String,
    pub status: String,
    /// The amount the gateway says was paid. Zero or absent means the gateway did not say.
    #[serde(default)]
    pub amount: Option<Amount>,
}

impl WebhookPayload {
    pub fn new<S: Into<String>>(external_id: S, status: S, amount: Option<Amount>) -> Self {
        Self { external_id: external_id.into(), status: status.into(), amount }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WebhookOutcome {
    /// The payment moved to PAID.
    Settled(Payment),
    /// The payment was already PAID. This is what a duplicate delivery looks like.
    AlreadyPaid(Payment),
    /// A status we know about but do not act on (FAILED, PENDING).
    Ignored(OrderId, String),
    /// A status we have never seen. The gateway may have introduced it since.
    Unrecognized(OrderId, String),
}

/// `WebhookApi` validates gateway notifications and applies them. It is the webhook half of the two convergence
/// paths; it settles payments through the same [`SettlementApi`] as the pending-invoice poll.
pub struct WebhookApi<B, P, A> {
    db: B,
    audit: A,
    settlement: SettlementApi<B, P, A>,
    detector: AnomalyDetector<B, A>,
}

impl<B, P, A> Debug for WebhookApi<B, P, A> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "WebhookApi")
    }
}

impl<B: Clone, P: Clone, A: Clone> Clone for WebhookApi<B, P, A> {
    fn clone(&self) -> Self {
        Self {
            db: self.db.clone(),
            audit: self.audit.clone(),
            settlement: self.settlement.clone(),
            detector: self.detector.clone(),
        }
    }
}

impl<B: Clone, P, A: Clone> WebhookApi<B, P, A> {
    pub fn new(settlement: SettlementApi<B, P, A>) -> Self {
        let db = settlement.db().clone();
        let audit = settlement.audit_sink().clone();
        let detector = AnomalyDetector::new(db.clone(), audit.clone()).with_producers(settlement.producers().clone());
        Self { db, audit, settlement, detector }
    }
}

impl<B, P, A> WebhookApi<B, P, A>
where
    B: PaymentStore,
    P: EventPublisher,
    A: AuditSink,
{
    /// Applies a gateway notification.
    ///
    /// The external id is validated before anything else; a malformed reference never reaches the store.
    pub async fn handle_notification(&self, payload: WebhookPayload) -> Result<WebhookOutcome, WebhookError> {
        let order_id = parse_order_id(&payload.external_id)?;
        trace!("🪝️ Notification for order {order_id}: {} ({:?})", payload.status, payload.amount);
        match payload.status.as_str() {
            "PAID" => self.handle_paid(order_id, payload.amount).await,
            "FAILED" | "PENDING" => {
                debug!("🪝️ {} notification for order {order_id} acknowledged. No action taken.", payload.status);
                self.audit_status(order_id, &payload, AuditEvent::WebhookStatusIgnored).await;
                Ok(WebhookOutcome::Ignored(order_id, payload.status))
            },
            _ => {
                warn!("🪝️ Unrecognized status '{}' for order {order_id}. Ignoring it.", payload.status);
                self.audit_status(order_id, &payload, AuditEvent::WebhookStatusUnrecognized).await;
                Ok(WebhookOutcome::Unrecognized(order_id, payload.status))
            },
        }
    }

    async fn handle_paid(&self, order_id: OrderId, reported: Option<Amount>) -> Result<WebhookOutcome, WebhookError> {
        let payment = self.db.fetch_payment_for_order(order_id).await?.ok_or(WebhookError::PaymentNotFound(order_id))?;
        if payment.status == PaymentStatus::Paid {
            info!("🪝️ Payment for order {order_id} is already PAID. Duplicate notification ignored.");
            self.audit_already_paid(&payment).await;
            return Ok(WebhookOutcome::AlreadyPaid(payment));
        }
        if let Some(reported) = reported.filter(|r| is_amount_mismatch(payment.amount, Some(*r))) {
            if let Err(e) = self.detector.record_amount_mismatch(&payment, reported, ACTOR).await {
                error!("🪝️ Could not store the amount mismatch for order {order_id}. It needs manual attention. {e}");
            }
            return Err(WebhookError::AmountMismatch { order_id, expected: payment.amount, reported });
        }
        match self.settlement.settle(payment, ACTOR).await? {
            SettlementOutcome::MarkedPaid(p) => Ok(WebhookOutcome::Settled(p)),
            SettlementOutcome::AlreadyPaid(p) => {
                self.audit_already_paid(&p).await;
                Ok(WebhookOutcome::AlreadyPaid(p))
            },
        }
    }

    async fn audit_already_paid(&self, payment: &Payment) {
        let entry = NewAuditEntry::for_payment(payment, AuditEvent::PaymentAlreadyPaid, ACTOR);
        audit(&self.audit, entry).await;
    }

    async fn audit_status(&self, order_id: OrderId, payload: &WebhookPayload, event: AuditEvent) {
        let entry = NewAuditEntry::new(order_id, event, ACTOR)
            .with_metadata(json!({ "status": payload.status, "amount": payload.amount }));
        let entry = match payload.external_id.parse() {
            Ok(external_id) => entry.with_external_id(external_id),
            Err(_) => entry,
        };
        audit(&self.audit, entry).await;
    }
}
