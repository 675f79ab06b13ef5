use thiserror::Error;

use crate::events::PaymentSuccessEvent;

/// Announces settled payments to downstream consumers on the event bus.
#[allow(async_fn_in_trait)]
pub trait EventPublisher {
    async fn publish_payment_success(&self, event: &PaymentSuccessEvent) -> Result<(), PublishError>;
}

#[derive(Debug, Clone, Error)]
pub enum PublishError {
    #[error("The event bus is unreachable. {0}")]
    Unreachable(String),
    #[error("The event bus rejected the message. Status {status}. {message}")]
    Rejected { status: u16, message: String },
    #[error("The event bus sent a response we could not understand. {0}")]
    InvalidResponse(String),
    #[error("Could not serialize the event. {0}")]
    Serialization(String),
}
