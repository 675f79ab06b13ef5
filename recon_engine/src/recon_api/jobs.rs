use std::time::Duration;

use log::*;

use crate::{
    recon_api::{invoice_api::InvoiceApi, reconciliation_api::ReconciliationApi, scheduler::ScheduledJob},
    traits::{AuditSink, EventPublisher, InvoiceGateway, PaymentStore, PaymentStoreError},
};

/// Polls the gateway for invoices that are still PENDING locally.
pub struct PendingInvoicePoll<B, G, P, A> {
    api: ReconciliationApi<B, G, P, A>,
    lookback: Duration,
}

impl<B, G, P, A> PendingInvoicePoll<B, G, P, A> {
    pub fn new(api: ReconciliationApi<B, G, P, A>, lookback: Duration) -> Self {
        Self { api, lookback }
    }
}

impl<B, G, P, A> ScheduledJob for PendingInvoicePoll<B, G, P, A>
where
    B: PaymentStore,
    G: InvoiceGateway,
    P: EventPublisher,
    A: AuditSink,
{
    type Error = PaymentStoreError;

    fn name(&self) -> &str {
        "Pending invoice poll"
    }

    async fn run_once(&mut self) -> Result<(), Self::Error> {
        let result = self.api.reconcile_pending_invoices(self.lookback).await?;
        if result.settled_count() > 0 {
            debug!("🕰️ Orders settled by the poll: {:?}", result.settled);
        }
        Ok(())
    }
}

/// Turns queued payment requests into invoices, one batch per run.
pub struct PaymentRequestDrain<B, G, A> {
    api: InvoiceApi<B, G, A>,
    batch_size: u32,
}

impl<B, G, A> PaymentRequestDrain<B, G, A> {
    pub fn new(api: InvoiceApi<B, G, A>, batch_size: u32) -> Self {
        Self { api, batch_size }
    }
}

impl<B, G, A> ScheduledJob for PaymentRequestDrain<B, G, A>
where
    B: PaymentStore,
    G: InvoiceGateway,
    A: AuditSink,
{
    type Error = PaymentStoreError;

    fn name(&self) -> &str {
        "Payment request drain"
    }

    async fn run_once(&mut self) -> Result<(), Self::Error> {
        let _ = self.api.drain_payment_requests(self.batch_size).await?;
        Ok(())
    }
}

/// Retires PENDING payments whose invoice has lapsed.
pub struct PaymentExpiry<B, G, P, A> {
    api: ReconciliationApi<B, G, P, A>,
}

impl<B, G, P, A> PaymentExpiry<B, G, P, A> {
    pub fn new(api: ReconciliationApi<B, G, P, A>) -> Self {
        Self { api }
    }
}

impl<B, G, P, A> ScheduledJob for PaymentExpiry<B, G, P, A>
where
    B: PaymentStore,
    G: InvoiceGateway,
    P: EventPublisher,
    A: AuditSink,
{
    type Error = PaymentStoreError;

    fn name(&self) -> &str {
        "Payment expiry"
    }

    async fn run_once(&mut self) -> Result<(), Self::Error> {
        let expired = self.api.expire_overdue_payments().await?;
        if !expired.is_empty() {
            info!("🕰️ {} payments expired", expired.len());
        }
        Ok(())
    }
}
