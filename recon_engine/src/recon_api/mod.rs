//! # Reconciliation engine public API
//!
//! The `recon_api` module exposes the programmatic API of the reconciliation engine. Every API object is built from
//! the small capability traits in [`crate::traits`], so any backend, gateway or publisher that implements them can be
//! plugged in.
//!
//! * [`settlement_api`] is the single path by which a payment becomes PAID (publish, then conditional update).
//! * [`webhook_api`] validates and applies gateway notifications.
//! * [`anomaly_detector`] quarantines payments whose confirmed amount disagrees with the invoice.
//! * [`invoice_api`] opens invoices directly or via queued payment requests.
//! * [`reconciliation_api`] polls the gateway for pending invoices and expires lapsed ones.
//! * [`review_api`] lets operators inspect payments and resolve quarantined records.
//! * [`scheduler`] and [`jobs`] run the background loops with a deterministic shutdown.
//!
//! # API usage
//!
//! ```rust,ignore
//! use recon_engine::{SettlementApi, SqliteDatabase, WebhookApi};
//! let db = SqliteDatabase::new_with_url(...).await?;
//! let settlement = SettlementApi::new(db.clone(), publisher, Some(db));
//! let webhooks = WebhookApi::new(settlement);
//! let outcome = webhooks.handle_notification(payload).await?;
//! ```
pub mod anomaly_detector;
pub mod errors;
pub mod invoice_api;
pub mod jobs;
pub mod reconciliation_api;
pub mod review_api;
pub mod scheduler;
pub mod settlement_api;
pub mod webhook_api;
