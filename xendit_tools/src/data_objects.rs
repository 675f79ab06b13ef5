use chrono::{DateTime, Utc};
use recon_common::Amount;
use serde::{Deserialize, Serialize};

/// Body of `POST /v2/invoices`.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct NewXenditInvoice {
    pub external_id: String,
    pub amount: Amount,
    pub description: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payer_email: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct XenditInvoice {
    pub id: String,
    #[serde(default)]
    pub external_id: Option<String>,
    #[serde(alias = "expiry_date")]
    pub expire_date: DateTime<Utc>,
    pub invoice_url: String,
    pub status: String,
    #[serde(default)]
    pub amount: Option<Amount>,
}
