//! A small client for the parts of the Xendit invoice API that the reconciliation server needs: opening an invoice
//! and looking up an invoice by its external id.
mod api;
mod config;
mod data_objects;
mod error;

pub use api::XenditApi;
pub use config::XenditConfig;
pub use data_objects::{NewXenditInvoice, XenditInvoice};
pub use error::XenditApiError;
