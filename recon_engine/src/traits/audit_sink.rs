use log::*;
use thiserror::Error;

use crate::db_types::NewAuditEntry;

/// An append-only trail of domain events.
///
/// The trail is observational. Nothing in the engine reads it back, and a failing sink never fails the operation
/// being audited.
#[allow(async_fn_in_trait)]
pub trait AuditSink {
    async fn append(&self, entry: NewAuditEntry) -> Result<(), AuditError>;
}

#[derive(Debug, Clone, Error)]
pub enum AuditError {
    #[error("Could not write audit entry. {0}")]
    WriteFailed(String),
}

impl From<sqlx::Error> for AuditError {
    fn from(e: sqlx::Error) -> Self {
        AuditError::WriteFailed(e.to_string())
    }
}

/// Discards every entry. Use when no audit storage is configured.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopAuditSink;

impl AuditSink for NoopAuditSink {
    async fn append(&self, entry: NewAuditEntry) -> Result<(), AuditError> {
        trace!("📝️ Audit disabled. Dropping {:?} for order {}", entry.event, entry.order_id);
        Ok(())
    }
}

/// `None` behaves like [`NoopAuditSink`].
impl<A: AuditSink> AuditSink for Option<A> {
    async fn append(&self, entry: NewAuditEntry) -> Result<(), AuditError> {
        match self {
            Some(sink) => sink.append(entry).await,
            None => NoopAuditSink.append(entry).await,
        }
    }
}

/// Writes `entry` to `sink`, logging rather than returning any failure.
pub async fn audit<A: AuditSink>(sink: &A, entry: NewAuditEntry) {
    let event = entry.event;
    let order_id = entry.order_id;
    if let Err(e) = sink.append(entry).await {
        warn!("📝️ Audit entry {event:?} for order {order_id} was lost. {e}");
    }
}
