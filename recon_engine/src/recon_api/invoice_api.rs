use std::{fmt::Debug, time::Duration};

use log::*;
use serde_json::json;

use crate::{
    db_types::{
        AuditActor,
        AuditEvent,
        ExternalId,
        NewAuditEntry,
        NewPayment,
        NewPaymentRequest,
        OrderId,
        Payment,
        PaymentRequest,
    },
    events::OrderCreatedEvent,
    recon_api::errors::InvoiceError,
    traits::{
        audit,
        with_deadline,
        AuditSink,
        DrainResult,
        GatewayError,
        Invoice,
        InvoiceGateway,
        InvoiceRequest,
        PaymentStore,
        PaymentStoreError,
    },
};

const DEFAULT_GATEWAY_DEADLINE: Duration = Duration::from_secs(30);

/// What order intake did with a new order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OrderIntakeOutcome {
    /// Invoice creation was deferred to the payment-request drain.
    Queued(PaymentRequest),
    InvoiceCreated(Payment),
}

/// `InvoiceApi` turns payment intent into gateway invoices.
///
/// Invoices are opened either directly ([`InvoiceApi::create_invoice`]), or by queueing a [`PaymentRequest`] that the
/// batch drain ([`InvoiceApi::drain_payment_requests`]) picks up later. Which path new orders take is decided by the
/// `defer_invoice_creation` toggle.
pub struct InvoiceApi<B, G, A> {
    db: B,
    gateway: G,
    audit: A,
    deadline: Duration,
    defer_invoice_creation: bool,
}

impl<B, G, A> Debug for InvoiceApi<B, G, A> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "InvoiceApi (deadline: {:?}, deferred: {})", self.deadline, self.defer_invoice_creation)
    }
}

impl<B: Clone, G: Clone, A: Clone> Clone for InvoiceApi<B, G, A> {
    fn clone(&self) -> Self {
        Self {
            db: self.db.clone(),
            gateway: self.gateway.clone(),
            audit: self.audit.clone(),
            deadline: self.deadline,
            defer_invoice_creation: self.defer_invoice_creation,
        }
    }
}

impl<B, G, A> InvoiceApi<B, G, A> {
    pub fn new(db: B, gateway: G, audit: A) -> Self {
        Self { db, gateway, audit, deadline: DEFAULT_GATEWAY_DEADLINE, defer_invoice_creation: false }
    }

    /// Every gateway call made by this API is abandoned after `deadline`.
    pub fn with_deadline(mut self, deadline: Duration) -> Self {
        self.deadline = deadline;
        self
    }

    pub fn with_deferred_invoice_creation(mut self, defer: bool) -> Self {
        self.defer_invoice_creation = defer;
        self
    }

    pub fn db(&self) -> &B {
        &self.db
    }
}

impl<B, G, A> InvoiceApi<B, G, A>
where
    B: PaymentStore,
    G: InvoiceGateway,
    A: AuditSink,
{
    /// Opens an invoice for the order right away and records the PENDING payment.
    ///
    /// Fails with [`InvoiceError::PaymentAlreadyExists`] if the order already has a payment; the gateway is not called
    /// in that case.
    pub async fn create_invoice(
        &self,
        request: &NewPaymentRequest,
        actor: AuditActor,
    ) -> Result<Payment, InvoiceError> {
        if request.amount.value().is_sign_negative() || request.amount.is_zero() {
            return Err(InvoiceError::InvalidAmount(request.amount));
        }
        let external_id = ExternalId::for_order(request.order_id);
        if self.db.fetch_payment_by_external_id(&external_id).await?.is_some() {
            info!("🧾️ Order {} already has a payment. No new invoice created.", request.order_id);
            return Err(InvoiceError::PaymentAlreadyExists(request.order_id));
        }
        let invoice = match self.open_invoice(request).await {
            Ok(invoice) => invoice,
            Err(e) => {
                self.audit_invoice_failure(request, &e, actor).await;
                return Err(e.into());
            },
        };
        let payment = self.db.insert_payment(new_payment_for(request, &invoice)).await?;
        self.audit_invoice_created(&payment, &invoice, actor).await;
        Ok(payment)
    }

    /// Queues a payment request for the batch drain.
    pub async fn enqueue_payment_request(
        &self,
        request: NewPaymentRequest,
        actor: AuditActor,
    ) -> Result<PaymentRequest, InvoiceError> {
        if request.amount.value().is_sign_negative() || request.amount.is_zero() {
            return Err(InvoiceError::InvalidAmount(request.amount));
        }
        let request = self.db.insert_payment_request(request).await?;
        info!("🧾️ Payment request {} queued for order {}", request.id, request.order_id);
        let entry = NewAuditEntry::new(request.order_id, AuditEvent::PaymentRequestCreated, actor)
            .with_external_id(request.external_id())
            .with_user_id(request.user_id)
            .with_metadata(json!({ "payment_request_id": request.id, "amount": request.amount }));
        audit(&self.audit, entry).await;
        Ok(request)
    }

    /// Intake for a new order: queue a payment request or open the invoice directly, depending on the
    /// `defer_invoice_creation` toggle.
    pub async fn handle_order_created(&self, event: OrderCreatedEvent) -> Result<OrderIntakeOutcome, InvoiceError> {
        let request = NewPaymentRequest::from(event);
        if self.defer_invoice_creation {
            let queued = self.enqueue_payment_request(request, AuditActor::OrderConsumer).await?;
            Ok(OrderIntakeOutcome::Queued(queued))
        } else {
            let payment = self.create_invoice(&request, AuditActor::OrderConsumer).await?;
            Ok(OrderIntakeOutcome::InvoiceCreated(payment))
        }
    }

    /// Processes one batch of up to `batch_size` PENDING payment requests, oldest first.
    ///
    /// Only a failure to read the batch is returned as an error. A failure on an individual request is logged, and
    /// the rest of the batch carries on.
    pub async fn drain_payment_requests(&self, batch_size: u32) -> Result<DrainResult, PaymentStoreError> {
        let requests = self.db.fetch_pending_payment_requests(batch_size).await?;
        let mut result = DrainResult::default();
        if requests.is_empty() {
            trace!("🧾️ No payment requests waiting");
            return Ok(result);
        }
        debug!("🧾️ Draining {} payment requests", requests.len());
        for request in requests {
            if let Err(e) = self.process_request(&request, &mut result).await {
                error!("🧾️ Could not process payment request {} for order {}. {e}", request.id, request.order_id);
            }
        }
        info!(
            "🧾️ Drain complete. {} invoices created, {} skipped, {} failed",
            result.created.len(),
            result.skipped,
            result.failed
        );
        Ok(result)
    }

    async fn process_request(&self, request: &PaymentRequest, result: &mut DrainResult) -> Result<(), PaymentStoreError> {
        let external_id = request.external_id();
        // A payment may already exist if we crashed between opening the invoice and closing the request
        if self.db.fetch_payment_by_external_id(&external_id).await?.is_some() {
            self.skip_request(request).await?;
            result.skipped += 1;
            return Ok(());
        }
        let new_request = NewPaymentRequest {
            order_id: request.order_id,
            user_id: request.user_id,
            amount: request.amount,
            user_email: request.user_email.clone(),
            payment_method: request.payment_method.clone(),
        };
        let invoice = match self.open_invoice(&new_request).await {
            Ok(invoice) => invoice,
            Err(e) => {
                warn!("🧾️ Invoice for payment request {} could not be created. {e}", request.id);
                self.db.mark_payment_request_failed(request.id, &e.to_string()).await?;
                self.audit_invoice_failure(&new_request, &e, AuditActor::BatchProcessor).await;
                result.failed += 1;
                return Ok(());
            },
        };
        match self.db.complete_payment_request(request.id, new_payment_for(&new_request, &invoice)).await {
            Ok(payment) => {
                self.audit_invoice_created(&payment, &invoice, AuditActor::BatchProcessor).await;
                result.created.push(payment);
                Ok(())
            },
            Err(PaymentStoreError::PaymentAlreadyExists(_)) => {
                self.skip_request(request).await?;
                result.skipped += 1;
                Ok(())
            },
            Err(e) => Err(e),
        }
    }

    async fn skip_request(&self, request: &PaymentRequest) -> Result<(), PaymentStoreError> {
        info!("🧾️ Order {} already has a payment. Closing payment request {}.", request.order_id, request.id);
        self.db.mark_payment_request_processed(request.id).await?;
        let entry = NewAuditEntry::new(request.order_id, AuditEvent::PaymentRequestSkipped, AuditActor::BatchProcessor)
            .with_external_id(request.external_id())
            .with_user_id(request.user_id)
            .with_metadata(json!({ "payment_request_id": request.id }));
        audit(&self.audit, entry).await;
        Ok(())
    }

    /// Moves FAILED requests that are still under the retry ceiling back to PENDING, so that the drain tries them
    /// again. This is an operator action; nothing calls it automatically.
    pub async fn requeue_failed_payment_requests(
        &self,
        limit: u32,
        max_retries: u32,
    ) -> Result<Vec<PaymentRequest>, PaymentStoreError> {
        let failed = self.db.fetch_failed_payment_requests(limit, max_retries).await?;
        let mut requeued = Vec::with_capacity(failed.len());
        for request in failed {
            if !self.db.requeue_payment_request(request.id).await? {
                debug!("🧾️ Payment request {} changed status before it could be requeued", request.id);
                continue;
            }
            let entry =
                NewAuditEntry::new(request.order_id, AuditEvent::PaymentRequestRequeued, AuditActor::Operator)
                    .with_external_id(request.external_id())
                    .with_user_id(request.user_id)
                    .with_metadata(json!({ "payment_request_id": request.id, "retry_count": request.retry_count }));
            audit(&self.audit, entry).await;
            requeued.push(request);
        }
        info!("🧾️ {} failed payment requests requeued", requeued.len());
        Ok(requeued)
    }

    async fn open_invoice(&self, request: &NewPaymentRequest) -> Result<Invoice, GatewayError> {
        let invoice_request = InvoiceRequest {
            external_id: ExternalId::for_order(request.order_id),
            amount: request.amount,
            description: invoice_description(request.order_id),
            payer_email: request.user_email.clone(),
        };
        let invoice = with_deadline(self.deadline, self.gateway.create_invoice(&invoice_request)).await?;
        debug!("🧾️ Invoice {} opened for order {}", invoice.id, request.order_id);
        Ok(invoice)
    }

    async fn audit_invoice_created(&self, payment: &Payment, invoice: &Invoice, actor: AuditActor) {
        let entry = NewAuditEntry::for_payment(payment, AuditEvent::InvoiceCreated, actor).with_metadata(json!({
            "invoice_id": invoice.id,
            "invoice_url": invoice.invoice_url,
            "expire_date": invoice.expire_date,
        }));
        audit(&self.audit, entry).await;
    }

    async fn audit_invoice_failure(&self, request: &NewPaymentRequest, error: &GatewayError, actor: AuditActor) {
        let entry = NewAuditEntry::new(request.order_id, AuditEvent::InvoiceCreationFailed, actor)
            .with_external_id(ExternalId::for_order(request.order_id))
            .with_user_id(request.user_id)
            .with_metadata(json!({ "error": error.to_string() }));
        audit(&self.audit, entry).await;
    }
}

pub fn invoice_description(order_id: OrderId) -> String {
    format!("Payment for order {}", order_id.value())
}

fn new_payment_for(request: &NewPaymentRequest, invoice: &Invoice) -> NewPayment {
    NewPayment::new(request.order_id, request.user_id, request.amount)
        .with_payment_method(request.payment_method.clone())
        .with_invoice(invoice.id.clone(), invoice.invoice_url.clone(), invoice.expire_date)
}
