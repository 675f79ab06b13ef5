//! Scripted stand-ins for the event bus and the payment gateway.
//!
//! Both fakes are cheap to clone and share their state between clones, so a test can hand one copy to the engine and
//! inspect another.
use std::{
    collections::{HashMap, HashSet, VecDeque},
    sync::{Arc, Mutex},
};

use chrono::{Duration, Utc};

use crate::{
    db_types::{ExternalId, OrderId},
    events::PaymentSuccessEvent,
    traits::{EventPublisher, GatewayError, Invoice, InvoiceGateway, InvoiceRequest, InvoiceStatus, PublishError},
};

/// An event publisher that follows a script of results, and succeeds once the script runs out.
#[derive(Debug, Clone, Default)]
pub struct ScriptedPublisher {
    script: Arc<Mutex<VecDeque<Result<(), PublishError>>>>,
    attempts: Arc<Mutex<Vec<PaymentSuccessEvent>>>,
    published: Arc<Mutex<Vec<PaymentSuccessEvent>>>,
}

impl ScriptedPublisher {
    pub fn new() -> Self {
        Self::default()
    }

    /// The next `n` publish attempts fail.
    pub fn fail_next(self, n: usize) -> Self {
        {
            let mut script = self.script.lock().unwrap();
            for i in 0..n {
                script.push_back(Err(PublishError::Unreachable(format!("scripted failure {}", i + 1))));
            }
        }
        self
    }

    /// Every attempt for the foreseeable future fails.
    pub fn always_fail(self) -> Self {
        self.fail_next(1_000)
    }

    /// Every publish attempt, successful or not, in order.
    pub fn attempts(&self) -> usize {
        self.attempts.lock().unwrap().len()
    }

    /// Events that were accepted by the "bus".
    pub fn published(&self) -> Vec<PaymentSuccessEvent> {
        self.published.lock().unwrap().clone()
    }
}

impl EventPublisher for ScriptedPublisher {
    async fn publish_payment_success(&self, event: &PaymentSuccessEvent) -> Result<(), PublishError> {
        self.attempts.lock().unwrap().push(event.clone());
        let next = self.script.lock().unwrap().pop_front().unwrap_or(Ok(()));
        if next.is_ok() {
            self.published.lock().unwrap().push(event.clone());
        }
        next
    }
}

#[derive(Debug, Default)]
struct GatewayState {
    statuses: HashMap<ExternalId, InvoiceStatus>,
    failing_orders: HashSet<OrderId>,
    unreachable: bool,
    created: Vec<InvoiceRequest>,
    status_queries: usize,
}

/// An in-memory payment gateway. Invoices are PENDING until a test says otherwise.
#[derive(Debug, Clone, Default)]
pub struct FakeGateway {
    state: Arc<Mutex<GatewayState>>,
}

impl FakeGateway {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_status(&self, order_id: OrderId, status: InvoiceStatus) {
        self.state.lock().unwrap().statuses.insert(ExternalId::for_order(order_id), status);
    }

    /// Invoice creation for this order is rejected.
    pub fn reject_order(&self, order_id: OrderId) {
        self.state.lock().unwrap().failing_orders.insert(order_id);
    }

    /// Every call fails as if the gateway were down.
    pub fn set_unreachable(&self, unreachable: bool) {
        self.state.lock().unwrap().unreachable = unreachable;
    }

    pub fn created_invoices(&self) -> Vec<InvoiceRequest> {
        self.state.lock().unwrap().created.clone()
    }

    pub fn status_queries(&self) -> usize {
        self.state.lock().unwrap().status_queries
    }
}

impl InvoiceGateway for FakeGateway {
    async fn create_invoice(&self, request: &InvoiceRequest) -> Result<Invoice, GatewayError> {
        let mut state = self.state.lock().unwrap();
        if state.unreachable {
            return Err(GatewayError::Unreachable("connection refused".into()));
        }
        let order_id = request.external_id.order_id().map_err(|e| GatewayError::InvalidResponse(e.to_string()))?;
        if state.failing_orders.contains(&order_id) {
            return Err(GatewayError::Rejected { status: 400, message: "API_VALIDATION_ERROR".into() });
        }
        state.created.push(request.clone());
        state.statuses.entry(request.external_id.clone()).or_insert(InvoiceStatus::Pending);
        Ok(Invoice {
            id: format!("inv-{}", order_id.value()),
            expire_date: Utc::now() + Duration::hours(24),
            invoice_url: format!("https://checkout.example.com/inv-{}", order_id.value()),
            status: "PENDING".into(),
        })
    }

    async fn invoice_status(&self, external_id: &ExternalId) -> Result<InvoiceStatus, GatewayError> {
        let mut state = self.state.lock().unwrap();
        state.status_queries += 1;
        if state.unreachable {
            return Err(GatewayError::Unreachable("connection refused".into()));
        }
        state.statuses.get(external_id).cloned().ok_or_else(|| GatewayError::InvoiceNotFound(external_id.to_string()))
    }
}
