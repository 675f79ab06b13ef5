use std::{fmt::Display, future::Future, time::Duration};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::db_types::{Amount, ExternalId};

/// Opens and queries invoices at the external payment gateway.
#[allow(async_fn_in_trait)]
pub trait InvoiceGateway {
    async fn create_invoice(&self, request: &InvoiceRequest) -> Result<Invoice, GatewayError>;

    /// The gateway's current status for the invoice with the given external id.
    async fn invoice_status(&self, external_id: &ExternalId) -> Result<InvoiceStatus, GatewayError>;
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvoiceRequest {
    pub external_id: ExternalId,
    pub amount: Amount,
    pub description: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payer_email: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Invoice {
    pub id: String,
    pub expire_date: DateTime<Utc>,
    pub invoice_url: String,
    pub status: String,
}

/// Invoice status as reported by the gateway.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InvoiceStatus {
    Pending,
    Paid,
    /// Paid, and the funds have since been settled to the merchant.
    Settled,
    Expired,
    Other(String),
}

impl InvoiceStatus {
    pub fn is_paid(&self) -> bool {
        matches!(self, InvoiceStatus::Paid | InvoiceStatus::Settled)
    }
}

impl From<&str> for InvoiceStatus {
    fn from(value: &str) -> Self {
        match value {
            "PENDING" => Self::Pending,
            "PAID" => Self::Paid,
            "SETTLED" => Self::Settled,
            "EXPIRED" => Self::Expired,
            s => Self::Other(s.to_string()),
        }
    }
}

impl Display for InvoiceStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            InvoiceStatus::Pending => write!(f, "PENDING"),
            InvoiceStatus::Paid => write!(f, "PAID"),
            InvoiceStatus::Settled => write!(f, "SETTLED"),
            InvoiceStatus::Expired => write!(f, "EXPIRED"),
            InvoiceStatus::Other(s) => write!(f, "{s}"),
        }
    }
}

#[derive(Debug, Clone, Error)]
pub enum GatewayError {
    #[error("The payment gateway is unreachable. {0}")]
    Unreachable(String),
    #[error("The payment gateway rejected the request. Status {status}. {message}")]
    Rejected { status: u16, message: String },
    #[error("The payment gateway sent a response we could not understand. {0}")]
    InvalidResponse(String),
    #[error("The payment gateway has no invoice for {0}")]
    InvoiceNotFound(String),
    #[error("The payment gateway did not respond within {0:?}")]
    Timeout(Duration),
}

/// Runs a gateway call, giving up with [`GatewayError::Timeout`] once `deadline` has passed.
pub async fn with_deadline<T, F>(deadline: Duration, call: F) -> Result<T, GatewayError>
where F: Future<Output = Result<T, GatewayError>> {
    match tokio::time::timeout(deadline, call).await {
        Ok(result) => result,
        Err(_) => Err(GatewayError::Timeout(deadline)),
    }
}
