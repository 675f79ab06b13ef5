//! Payment Reconciliation Engine
//!
//! The engine decides how a payment moves through its lifecycle, and keeps the payment gateway, the event bus and the
//! local system of record consistent with each other when any of them misbehave.
//!
//! The library is divided into these main sections:
//! 1. Domain types ([`mod@db_types`]) and the capability traits that collaborators implement ([`mod@traits`]): a
//!    payment store, an invoice gateway, an event publisher and an audit sink.
//! 2. A SQLite backend ([`SqliteDatabase`]) that implements the store and the audit sink.
//! 3. The public API ([`mod@recon_api`]): settlement, webhook processing, anomaly detection, invoice creation, the
//!    pending-invoice poll and the cancellable scheduler that runs the background loops.
//!
//! The engine also emits in-process events when a payment is settled or quarantined. See [`mod@events`].
pub mod db_types;
pub mod events;
pub mod helpers;
pub mod recon_api;
#[cfg(feature = "sqlite")]
pub mod sqlite;
pub mod traits;

#[cfg(any(feature = "test_utils", test))]
pub mod test_utils;

pub use recon_api::{
    anomaly_detector::{is_amount_mismatch, AnomalyDetector},
    errors::{InvoiceError, SettlementError, WebhookError},
    invoice_api::{InvoiceApi, OrderIntakeOutcome},
    jobs::{PaymentExpiry, PaymentRequestDrain, PendingInvoicePoll},
    reconciliation_api::ReconciliationApi,
    review_api::ReviewApi,
    scheduler::{run_scheduled, shutdown_channel, ScheduledJob, Shutdown, ShutdownTrigger},
    settlement_api::{SettlementApi, SettlementOutcome},
    webhook_api::{WebhookApi, WebhookOutcome, WebhookPayload},
};
#[cfg(feature = "sqlite")]
pub use sqlite::SqliteDatabase;
pub use traits::{AuditSink, EventPublisher, InvoiceGateway, NoopAuditSink, PaymentStore};
