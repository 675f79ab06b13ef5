use chrono::{DateTime, Utc};
use log::{debug, trace};
use sqlx::SqliteConnection;

use super::{is_unique_violation, optional_row, single_row};
use crate::{
    db_types::{ExternalId, NewPayment, OrderId, Payment},
    traits::PaymentStoreError,
};

/// Inserts a new PENDING payment. The external id is derived from the order id, and the unique index on it turns a
/// second insert for the same order into [`PaymentStoreError::PaymentAlreadyExists`].
pub async fn insert_payment(
    payment: NewPayment,
    now: DateTime<Utc>,
    conn: &mut SqliteConnection,
) -> Result<Payment, PaymentStoreError> {
    let external_id = payment.external_id();
    let result: Result<Vec<Payment>, sqlx::Error> = sqlx::query_as(
        r#"
            INSERT INTO payments (
                order_id,
                user_id,
                external_id,
                invoice_id,
                invoice_url,
                amount,
                payment_method,
                status,
                created_at,
                updated_at,
                expires_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, 'PENDING', $8, $8, $9)
            RETURNING *;
        "#,
    )
    .bind(payment.order_id)
    .bind(payment.user_id)
    .bind(&external_id)
    .bind(payment.invoice_id)
    .bind(payment.invoice_url)
    .bind(payment.amount)
    .bind(payment.payment_method)
    .bind(now)
    .bind(payment.expires_at)
    .fetch_all(conn)
    .await;
    match result.and_then(single_row) {
        Ok(payment) => {
            debug!("🗃️ Payment [{}] for order {} inserted with id {}", payment.external_id, payment.order_id, payment.id);
            Ok(payment)
        },
        Err(e) if is_unique_violation(&e) => Err(PaymentStoreError::PaymentAlreadyExists(external_id)),
        Err(e) => Err(e.into()),
    }
}

/// Returns the authoritative payment for the order. If there is more than one, the most recent one wins.
pub async fn fetch_payment_for_order(
    order_id: OrderId,
    conn: &mut SqliteConnection,
) -> Result<Option<Payment>, sqlx::Error> {
    let payment = sqlx::query_as("SELECT * FROM payments WHERE order_id = $1 ORDER BY id DESC LIMIT 1")
        .bind(order_id)
        .fetch_optional(conn)
        .await?;
    Ok(payment)
}

pub async fn fetch_payment_by_external_id(
    external_id: &ExternalId,
    conn: &mut SqliteConnection,
) -> Result<Option<Payment>, sqlx::Error> {
    let payment = sqlx::query_as("SELECT * FROM payments WHERE external_id = $1")
        .bind(external_id)
        .fetch_optional(conn)
        .await?;
    Ok(payment)
}

/// PENDING -> PAID, guarded on the current status. Returns `None` if no PENDING payment matched.
pub async fn mark_paid(
    external_id: &ExternalId,
    now: DateTime<Utc>,
    conn: &mut SqliteConnection,
) -> Result<Option<Payment>, sqlx::Error> {
    let rows: Vec<Payment> = sqlx::query_as(
        r#"
        UPDATE payments SET status = 'PAID', updated_at = $1
        WHERE external_id = $2 AND status = 'PENDING'
        RETURNING *;
        "#,
    )
    .bind(now)
    .bind(external_id)
    .fetch_all(conn)
    .await?;
    let payment = optional_row(rows);
    trace!("🗃️ mark_paid [{external_id}] updated {} rows", payment.as_ref().map_or(0, |_| 1));
    Ok(payment)
}

/// PENDING payments created at or after `since`, oldest first.
pub async fn fetch_pending_since(
    since: DateTime<Utc>,
    conn: &mut SqliteConnection,
) -> Result<Vec<Payment>, sqlx::Error> {
    let payments = sqlx::query_as(
        r#"
        SELECT * FROM payments
        WHERE status = 'PENDING' AND julianday(created_at) >= julianday($1)
        ORDER BY julianday(created_at) ASC, id ASC;
        "#,
    )
    .bind(since)
    .fetch_all(conn)
    .await?;
    Ok(payments)
}

/// PENDING -> EXPIRED for every payment whose expiry time is before `now`, in a single statement.
pub async fn expire_overdue(now: DateTime<Utc>, conn: &mut SqliteConnection) -> Result<Vec<Payment>, sqlx::Error> {
    let payments: Vec<Payment> = sqlx::query_as(
        r#"
        UPDATE payments SET status = 'EXPIRED', updated_at = $1
        WHERE status = 'PENDING' AND expires_at IS NOT NULL AND julianday(expires_at) < julianday($1)
        RETURNING *;
        "#,
    )
    .bind(now)
    .fetch_all(conn)
    .await?;
    if !payments.is_empty() {
        debug!("🗃️ {} payments have expired", payments.len());
    }
    Ok(payments)
}
