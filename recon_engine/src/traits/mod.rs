//! # Capability traits
//!
//! The engine talks to each of its collaborators through one small trait. Backends and clients implement the trait
//! they provide, and nothing more:
//!
//! * [`PaymentStore`] is the system of record. It owns every status transition of payments and payment requests, and
//!   stores the quarantine records (anomalies and failed events).
//! * [`EventPublisher`] announces settled payments to the event bus.
//! * [`InvoiceGateway`] opens and queries invoices at the payment gateway.
//! * [`AuditSink`] receives the audit trail. [`NoopAuditSink`] (or `None`) switches auditing off.
mod audit_sink;
mod data_objects;
mod event_publisher;
mod invoice_gateway;
mod payment_store;

pub use audit_sink::{audit, AuditError, AuditSink, NoopAuditSink};
pub use data_objects::{DrainResult, PollResult};
pub use event_publisher::{EventPublisher, PublishError};
pub use invoice_gateway::{with_deadline, GatewayError, Invoice, InvoiceGateway, InvoiceRequest, InvoiceStatus};
pub use payment_store::{PaymentStore, PaymentStoreError};
