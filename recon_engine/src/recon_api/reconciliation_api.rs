use std::{fmt::Debug, time::Duration};

use chrono::Utc;
use log::*;
use serde_json::json;

use crate::{
    db_types::{AuditActor, AuditEvent, NewAuditEntry, Payment},
    recon_api::settlement_api::{SettlementApi, SettlementOutcome},
    traits::{audit, with_deadline, AuditSink, EventPublisher, InvoiceGateway, PaymentStore, PaymentStoreError, PollResult},
};

const DEFAULT_GATEWAY_DEADLINE: Duration = Duration::from_secs(30);
const MAX_LOOKBACK_DAYS: i64 = 3650;

/// `ReconciliationApi` is the poll-driven convergence path. It asks the gateway about invoices that are still PENDING
/// locally, and settles the ones the gateway reports as paid. It also retires invoices that have expired.
pub struct ReconciliationApi<B, G, P, A> {
    db: B,
    gateway: G,
    audit: A,
    settlement: SettlementApi<B, P, A>,
    deadline: Duration,
}

impl<B, G, P, A> Debug for ReconciliationApi<B, G, P, A> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "ReconciliationApi (deadline: {:?})", self.deadline)
    }
}

impl<B: Clone, G: Clone, P: Clone, A: Clone> Clone for ReconciliationApi<B, G, P, A> {
    fn clone(&self) -> Self {
        Self {
            db: self.db.clone(),
            gateway: self.gateway.clone(),
            audit: self.audit.clone(),
            settlement: self.settlement.clone(),
            deadline: self.deadline,
        }
    }
}

impl<B: Clone, G, P, A: Clone> ReconciliationApi<B, G, P, A> {
    pub fn new(gateway: G, settlement: SettlementApi<B, P, A>) -> Self {
        let db = settlement.db().clone();
        let audit = settlement.audit_sink().clone();
        Self { db, gateway, audit, settlement, deadline: DEFAULT_GATEWAY_DEADLINE }
    }

    pub fn with_deadline(mut self, deadline: Duration) -> Self {
        self.deadline = deadline;
        self
    }
}

impl<B, G, P, A> ReconciliationApi<B, G, P, A>
where
    B: PaymentStore,
    G: InvoiceGateway,
    P: EventPublisher,
    A: AuditSink,
{
    /// Checks every PENDING payment created within `lookback` against the gateway.
    ///
    /// Only a failure to read the pending payments is returned as an error. A failed gateway query or settlement is
    /// logged, counted in [`PollResult::errors`], and the poll moves on to the next invoice.
    pub async fn reconcile_pending_invoices(&self, lookback: Duration) -> Result<PollResult, PaymentStoreError> {
        let lookback =
            chrono::Duration::from_std(lookback).unwrap_or_else(|_| chrono::Duration::days(MAX_LOOKBACK_DAYS));
        let since = Utc::now() - lookback.min(chrono::Duration::days(MAX_LOOKBACK_DAYS));
        let pending = self.db.fetch_pending_payments_since(since).await?;
        let mut result = PollResult { checked: pending.len(), ..Default::default() };
        if pending.is_empty() {
            trace!("🕰️ No pending invoices to reconcile");
            return Ok(result);
        }
        debug!("🕰️ Reconciling {} pending invoices", pending.len());
        for payment in pending {
            let order_id = payment.order_id;
            let status = match with_deadline(self.deadline, self.gateway.invoice_status(&payment.external_id)).await {
                Ok(status) => status,
                Err(e) => {
                    warn!("🕰️ Could not fetch the invoice status for order {order_id}. Skipping it this round. {e}");
                    result.errors += 1;
                    continue;
                },
            };
            if !status.is_paid() {
                trace!("🕰️ Invoice for order {order_id} is {status}");
                continue;
            }
            match self.settlement.settle(payment, AuditActor::Scheduler).await {
                Ok(SettlementOutcome::MarkedPaid(_)) => result.settled.push(order_id),
                Ok(SettlementOutcome::AlreadyPaid(_)) => result.already_paid += 1,
                Err(e) => {
                    warn!("🕰️ Order {order_id} is paid at the gateway, but could not be settled. {e}");
                    result.errors += 1;
                },
            }
        }
        info!(
            "🕰️ Reconciled {} pending invoices. {} settled, {} still pending, {} errors",
            result.checked,
            result.settled_count(),
            result.still_pending(),
            result.errors
        );
        Ok(result)
    }

    /// Marks every PENDING payment whose invoice has lapsed as EXPIRED.
    pub async fn expire_overdue_payments(&self) -> Result<Vec<Payment>, PaymentStoreError> {
        let expired = self.db.expire_overdue_payments(Utc::now()).await?;
        for payment in &expired {
            info!("🕰️ Invoice for order {} has expired", payment.order_id);
            let entry = NewAuditEntry::for_payment(payment, AuditEvent::PaymentExpired, AuditActor::Scheduler)
                .with_metadata(json!({ "expires_at": payment.expires_at }));
            audit(&self.audit, entry).await;
        }
        Ok(expired)
    }
}
