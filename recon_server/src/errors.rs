use actix_web::{
    error::ResponseError,
    http::{header::ContentType, StatusCode},
    HttpResponse,
};
use recon_engine::{traits::PaymentStoreError, InvoiceError, SettlementError, WebhookError};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("Could not initialize server. {0}")]
    InitializeError(String),
    #[error("An error occurred on the backend of the server. {0}")]
    BackendError(String),
    #[error("Could not read request body: {0}")]
    InvalidRequestBody(String),
    #[error("Could not read request path: {0}")]
    InvalidRequestPath(String),
    #[error("An I/O error happened in the server. {0}")]
    IOError(#[from] std::io::Error),
    #[error("Invalid server configuration. {0}")]
    ConfigurationError(String),
    #[error("UnspecifiedError. {0}")]
    Unspecified(String),
    #[error("Missing or invalid access token")]
    Unauthorized,
    #[error("The data was not found. {0}")]
    NoRecordFound(String),
    #[error("{0}")]
    MalformedReference(String),
    #[error("{0}")]
    AmountMismatch(String),
    #[error("{0}")]
    Conflict(String),
    #[error("{0}")]
    InvalidAmount(String),
    #[error("The payment gateway could not complete the request. {0}")]
    GatewayError(String),
    #[error("{0}")]
    PublishFailed(String),
}

impl ResponseError for ServerError {
    fn status_code(&self) -> StatusCode {
        match self {
            Self::InvalidRequestBody(_) => StatusCode::BAD_REQUEST,
            Self::InvalidRequestPath(_) => StatusCode::BAD_REQUEST,
            Self::MalformedReference(_) => StatusCode::BAD_REQUEST,
            Self::InvalidAmount(_) => StatusCode::BAD_REQUEST,
            Self::Unauthorized => StatusCode::UNAUTHORIZED,
            Self::NoRecordFound(_) => StatusCode::NOT_FOUND,
            Self::Conflict(_) => StatusCode::CONFLICT,
            Self::AmountMismatch(_) => StatusCode::UNPROCESSABLE_ENTITY,
            Self::GatewayError(_) => StatusCode::BAD_GATEWAY,
            Self::InitializeError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::BackendError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::IOError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::ConfigurationError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Unspecified(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::PublishFailed(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.status_code())
            .insert_header(ContentType::json())
            .body(serde_json::json!({ "error": self.to_string() }).to_string())
    }
}

impl From<PaymentStoreError> for ServerError {
    fn from(e: PaymentStoreError) -> Self {
        match e {
            PaymentStoreError::PaymentAlreadyExists(_) => Self::Conflict(e.to_string()),
            PaymentStoreError::PaymentRequestNotFound(_) => Self::NoRecordFound(e.to_string()),
            PaymentStoreError::PaymentRequestNotPending(_) => Self::Conflict(e.to_string()),
            PaymentStoreError::DatabaseError(_) => Self::BackendError(e.to_string()),
        }
    }
}

impl From<SettlementError> for ServerError {
    fn from(e: SettlementError) -> Self {
        match e {
            SettlementError::PaymentNotFound(_) => Self::NoRecordFound(e.to_string()),
            SettlementError::InvalidStatus { .. } => Self::Conflict(e.to_string()),
            SettlementError::PublishFailed { .. } => Self::PublishFailed(e.to_string()),
            SettlementError::StoreError(e) => e.into(),
        }
    }
}

impl From<WebhookError> for ServerError {
    fn from(e: WebhookError) -> Self {
        match e {
            WebhookError::MalformedReference(_) => Self::MalformedReference(e.to_string()),
            WebhookError::AmountMismatch { .. } => Self::AmountMismatch(e.to_string()),
            WebhookError::PaymentNotFound(_) => Self::NoRecordFound(e.to_string()),
            WebhookError::SettlementError(e) => e.into(),
            WebhookError::StoreError(e) => e.into(),
        }
    }
}

impl From<InvoiceError> for ServerError {
    fn from(e: InvoiceError) -> Self {
        match e {
            InvoiceError::PaymentAlreadyExists(_) => Self::Conflict(e.to_string()),
            InvoiceError::InvalidAmount(_) => Self::InvalidAmount(e.to_string()),
            InvoiceError::GatewayError(_) => Self::GatewayError(e.to_string()),
            InvoiceError::StoreError(e) => e.into(),
        }
    }
}
