use std::{fmt::Display, str::FromStr};

use chrono::{DateTime, Utc};
pub use recon_common::Amount;
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, Type};
use thiserror::Error;

const EXTERNAL_ID_PREFIX: &str = "order-";

//--------------------------------------        OrderId        ---------------------------------------------------------
/// The business key of an order, as assigned by the upstream order service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Type, Serialize, Deserialize)]
#[sqlx(transparent)]
#[serde(transparent)]
pub struct OrderId(pub i64);

impl OrderId {
    pub fn value(&self) -> i64 {
        self.0
    }
}

impl From<i64> for OrderId {
    fn from(value: i64) -> Self {
        Self(value)
    }
}

impl Display for OrderId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

//--------------------------------------      ExternalId       ---------------------------------------------------------
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("Malformed external reference: {0:?}. Expected order-<id>")]
pub struct MalformedReference(pub String);

/// The reference shared with the payment gateway. It is always `order-<order_id>`, so it is globally unique per order
/// and can be decoded back into the [`OrderId`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, Type, Serialize, Deserialize)]
#[sqlx(transparent)]
#[serde(transparent)]
pub struct ExternalId(String);

impl ExternalId {
    pub fn for_order(order_id: OrderId) -> Self {
        Self(format!("{EXTERNAL_ID_PREFIX}{}", order_id.0))
    }

    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }

    pub fn order_id(&self) -> Result<OrderId, MalformedReference> {
        parse_order_id(&self.0)
    }
}

/// Decodes an `order-<id>` reference. The prefix is mandatory and the id must be a positive base-10 integer.
pub fn parse_order_id(reference: &str) -> Result<OrderId, MalformedReference> {
    let digits =
        reference.strip_prefix(EXTERNAL_ID_PREFIX).ok_or_else(|| MalformedReference(reference.to_string()))?;
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return Err(MalformedReference(reference.to_string()));
    }
    match digits.parse::<i64>() {
        Ok(id) if id > 0 => Ok(OrderId(id)),
        _ => Err(MalformedReference(reference.to_string())),
    }
}

impl FromStr for ExternalId {
    type Err = MalformedReference;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let order_id = parse_order_id(s)?;
        Ok(Self::for_order(order_id))
    }
}

impl Display for ExternalId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Error)]
#[error("Invalid status: {0}")]
pub struct ConversionError(String);

//--------------------------------------     PaymentStatus     ---------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Type, Serialize, Deserialize)]
#[sqlx(rename_all = "UPPERCASE")]
#[serde(rename_all = "UPPERCASE")]
pub enum PaymentStatus {
    /// An invoice is open at the gateway and no payment has been confirmed.
    Pending,
    /// Payment confirmed. Terminal.
    Paid,
    /// The invoice lapsed before it was paid. Terminal.
    Expired,
    /// Terminal.
    Failed,
}

impl Display for PaymentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PaymentStatus::Pending => write!(f, "PENDING"),
            PaymentStatus::Paid => write!(f, "PAID"),
            PaymentStatus::Expired => write!(f, "EXPIRED"),
            PaymentStatus::Failed => write!(f, "FAILED"),
        }
    }
}

impl FromStr for PaymentStatus {
    type Err = ConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "PENDING" => Ok(Self::Pending),
            "PAID" => Ok(Self::Paid),
            "EXPIRED" => Ok(Self::Expired),
            "FAILED" => Ok(Self::Failed),
            s => Err(ConversionError(format!("Invalid payment status: {s}"))),
        }
    }
}

//--------------------------------------        Payment        ---------------------------------------------------------
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct Payment {
    pub id: i64,
    pub order_id: OrderId,
    pub user_id: i64,
    pub external_id: ExternalId,
    pub invoice_id: Option<String>,
    pub invoice_url: Option<String>,
    pub amount: Amount,
    pub payment_method: String,
    pub status: PaymentStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub expires_at: Option<DateTime<Utc>>,
}

//--------------------------------------       NewPayment      ---------------------------------------------------------
#[derive(Debug, Clone)]
pub struct NewPayment {
    pub order_id: OrderId,
    pub user_id: i64,
    pub amount: Amount,
    pub payment_method: String,
    pub invoice_id: Option<String>,
    pub invoice_url: Option<String>,
    pub expires_at: Option<DateTime<Utc>>,
}

impl NewPayment {
    pub fn new(order_id: OrderId, user_id: i64, amount: Amount) -> Self {
        Self {
            order_id,
            user_id,
            amount,
            payment_method: String::default(),
            invoice_id: None,
            invoice_url: None,
            expires_at: None,
        }
    }

    pub fn external_id(&self) -> ExternalId {
        ExternalId::for_order(self.order_id)
    }

    pub fn with_payment_method<S: Into<String>>(mut self, method: S) -> Self {
        self.payment_method = method.into();
        self
    }

    pub fn with_invoice(mut self, invoice_id: String, invoice_url: String, expires_at: DateTime<Utc>) -> Self {
        self.invoice_id = Some(invoice_id);
        self.invoice_url = Some(invoice_url);
        self.expires_at = Some(expires_at);
        self
    }
}

//-------------------------------------- PaymentRequestStatus ---------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Type, Serialize, Deserialize)]
#[sqlx(rename_all = "UPPERCASE")]
#[serde(rename_all = "UPPERCASE")]
pub enum PaymentRequestStatus {
    /// Waiting for the batch processor.
    Pending,
    /// Processed: an invoice exists for the request.
    Paid,
    /// The last attempt to open an invoice failed.
    Failed,
}

impl Display for PaymentRequestStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PaymentRequestStatus::Pending => write!(f, "PENDING"),
            PaymentRequestStatus::Paid => write!(f, "PAID"),
            PaymentRequestStatus::Failed => write!(f, "FAILED"),
        }
    }
}

//--------------------------------------    PaymentRequest     ---------------------------------------------------------
/// A queued intent to open an invoice for an order.
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct PaymentRequest {
    pub id: i64,
    pub order_id: OrderId,
    pub user_id: i64,
    pub amount: Amount,
    pub user_email: Option<String>,
    pub payment_method: String,
    pub status: PaymentRequestStatus,
    pub retry_count: i64,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl PaymentRequest {
    pub fn external_id(&self) -> ExternalId {
        ExternalId::for_order(self.order_id)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewPaymentRequest {
    pub order_id: OrderId,
    pub user_id: i64,
    pub amount: Amount,
    #[serde(default)]
    pub user_email: Option<String>,
    #[serde(default)]
    pub payment_method: String,
}

//--------------------------------------     ReviewStatus      ---------------------------------------------------------
/// Review state for quarantine records ([`PaymentAnomaly`], [`FailedEvent`]). Only operators move these to `Resolved`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Type, Serialize, Deserialize)]
#[sqlx(rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReviewStatus {
    NeedsReview,
    Resolved,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Type, Serialize, Deserialize)]
#[sqlx(rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AnomalyType {
    /// The gateway confirmed a different amount to the one that was invoiced.
    InvalidAmount,
    /// The gateway confirmed a payment that was already expired or failed.
    PaidAfterClose,
}

//--------------------------------------    PaymentAnomaly     ---------------------------------------------------------
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct PaymentAnomaly {
    pub id: i64,
    pub order_id: OrderId,
    pub external_id: ExternalId,
    pub anomaly_type: AnomalyType,
    pub notes: String,
    pub status: ReviewStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewPaymentAnomaly {
    pub order_id: OrderId,
    pub external_id: ExternalId,
    pub anomaly_type: AnomalyType,
    pub notes: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Type, Serialize, Deserialize)]
#[sqlx(rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FailedEventType {
    /// The payment success announcement could not be published after every retry.
    PublishPaymentSuccess,
}

//--------------------------------------      FailedEvent      ---------------------------------------------------------
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct FailedEvent {
    pub id: i64,
    pub order_id: OrderId,
    pub external_id: ExternalId,
    pub failed_type: FailedEventType,
    pub notes: String,
    pub status: ReviewStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewFailedEvent {
    pub order_id: OrderId,
    pub external_id: ExternalId,
    pub failed_type: FailedEventType,
    pub notes: String,
}

//--------------------------------------       AuditLog        ---------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Type, Serialize, Deserialize)]
#[sqlx(rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AuditEvent {
    MarkPaid,
    PaymentAlreadyPaid,
    PaymentAnomalyDetected,
    FailedPublishEvent,
    WebhookStatusIgnored,
    WebhookStatusUnrecognized,
    InvoiceCreated,
    InvoiceCreationFailed,
    PaymentRequestCreated,
    PaymentRequestSkipped,
    PaymentRequestRequeued,
    PaymentExpired,
    AnomalyResolved,
    FailedEventResolved,
    PaymentStatusConflict,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Type, Serialize, Deserialize)]
#[sqlx(rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum AuditActor {
    WebhookHandler,
    PaymentService,
    OrderConsumer,
    BatchProcessor,
    Scheduler,
    Operator,
}

#[derive(Debug, Clone, PartialEq, FromRow, Serialize, Deserialize)]
pub struct AuditEntry {
    pub id: i64,
    pub order_id: OrderId,
    pub payment_id: Option<i64>,
    pub user_id: Option<i64>,
    pub external_id: Option<ExternalId>,
    pub event: AuditEvent,
    pub actor: AuditActor,
    /// Free-form JSON
    pub metadata: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewAuditEntry {
    pub order_id: OrderId,
    pub payment_id: Option<i64>,
    pub user_id: Option<i64>,
    pub external_id: Option<ExternalId>,
    pub event: AuditEvent,
    pub actor: AuditActor,
    pub metadata: Option<serde_json::Value>,
}

impl NewAuditEntry {
    pub fn new(order_id: OrderId, event: AuditEvent, actor: AuditActor) -> Self {
        Self { order_id, payment_id: None, user_id: None, external_id: None, event, actor, metadata: None }
    }

    pub fn for_payment(payment: &Payment, event: AuditEvent, actor: AuditActor) -> Self {
        Self {
            order_id: payment.order_id,
            payment_id: Some(payment.id),
            user_id: Some(payment.user_id),
            external_id: Some(payment.external_id.clone()),
            event,
            actor,
            metadata: None,
        }
    }

    pub fn with_external_id(mut self, external_id: ExternalId) -> Self {
        self.external_id = Some(external_id);
        self
    }

    pub fn with_user_id(mut self, user_id: i64) -> Self {
        self.user_id = Some(user_id);
        self
    }

    pub fn with_metadata(mut self, metadata: serde_json::Value) -> Self {
        self.metadata = Some(metadata);
        self
    }
}
