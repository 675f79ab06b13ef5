//! Background workers.
//!
//! Each worker is a [`ScheduledJob`] driven by [`run_scheduled`] on its own tokio task. They all share one shutdown
//! signal, so [`Workers::shutdown`] stops every loop at its next tick boundary and waits for it to finish.
use log::*;
use recon_engine::{
    run_scheduled,
    shutdown_channel,
    InvoiceApi,
    PaymentExpiry,
    PaymentRequestDrain,
    PendingInvoicePoll,
    ReconciliationApi,
    ScheduledJob,
    ShutdownTrigger,
    SqliteDatabase,
};
use tokio::task::JoinHandle;

use crate::{
    config::ServerConfig,
    errors::ServerError,
    integrations::{
        event_bus::{KafkaRestPublisher, OrderCreatedConsumer},
        xendit::XenditGateway,
    },
};

pub type Audit = Option<SqliteDatabase>;
pub type ServerInvoiceApi = InvoiceApi<SqliteDatabase, XenditGateway, Audit>;
pub type ServerReconciliationApi = ReconciliationApi<SqliteDatabase, XenditGateway, KafkaRestPublisher, Audit>;

pub struct Workers {
    trigger: ShutdownTrigger,
    handles: Vec<(String, JoinHandle<u64>)>,
}

impl Workers {
    pub fn count(&self) -> usize {
        self.handles.len()
    }

    /// Signals every worker to stop and waits until they have.
    pub async fn shutdown(self) {
        info!("🕰️ Stopping {} background workers", self.handles.len());
        self.trigger.trigger();
        for (name, handle) in self.handles {
            match handle.await {
                Ok(runs) => debug!("🕰️ {name} stopped after {runs} runs"),
                Err(e) => error!("🕰️ {name} did not shut down cleanly. {e}"),
            }
        }
    }
}

/// Starts the pending-invoice poll, the payment request drain, the expiry worker and, if enabled, the order-created
/// consumer. Do not await the workers individually; call [`Workers::shutdown`] when the server stops.
pub fn start_workers(
    config: &ServerConfig,
    invoices: ServerInvoiceApi,
    reconciliation: ServerReconciliationApi,
) -> Result<Workers, ServerError> {
    let (trigger, shutdown) = shutdown_channel();
    let jobs = &config.jobs;
    let mut handles = Vec::with_capacity(4);

    let poll = PendingInvoicePoll::new(reconciliation.clone(), jobs.pending_lookback);
    let name = poll.name().to_string();
    handles.push((name, tokio::spawn(run_scheduled(poll, jobs.pending_poll_interval, shutdown.clone()))));

    let drain = PaymentRequestDrain::new(invoices.clone(), jobs.drain_batch_size);
    let name = drain.name().to_string();
    handles.push((name, tokio::spawn(run_scheduled(drain, jobs.drain_interval, shutdown.clone()))));

    let expiry = PaymentExpiry::new(reconciliation);
    let name = expiry.name().to_string();
    handles.push((name, tokio::spawn(run_scheduled(expiry, jobs.expiry_interval, shutdown.clone()))));

    if config.event_bus.order_consumer_enabled {
        let consumer = OrderCreatedConsumer::new(&config.event_bus, invoices)
            .map_err(|e| ServerError::InitializeError(e.to_string()))?;
        let name = consumer.name().to_string();
        handles.push((name, tokio::spawn(run_scheduled(consumer, jobs.drain_interval, shutdown))));
    } else {
        info!("🕰️ The order-created consumer is disabled. Orders can still be submitted over HTTP.");
    }
    Ok(Workers { trigger, handles })
}
