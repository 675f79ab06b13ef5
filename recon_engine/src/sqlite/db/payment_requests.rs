use chrono::{DateTime, Utc};
use log::debug;
use sqlx::SqliteConnection;

use super::single_row;
use crate::db_types::{NewPaymentRequest, PaymentRequest};

pub async fn insert_payment_request(
    request: NewPaymentRequest,
    now: DateTime<Utc>,
    conn: &mut SqliteConnection,
) -> Result<PaymentRequest, sqlx::Error> {
    let rows: Vec<PaymentRequest> = sqlx::query_as(
        r#"
            INSERT INTO payment_requests (
                order_id,
                user_id,
                amount,
                user_email,
                payment_method,
                status,
                retry_count,
                created_at,
                updated_at
            ) VALUES ($1, $2, $3, $4, $5, 'PENDING', 0, $6, $6)
            RETURNING *;
        "#,
    )
    .bind(request.order_id)
    .bind(request.user_id)
    .bind(request.amount)
    .bind(request.user_email)
    .bind(request.payment_method)
    .bind(now)
    .fetch_all(conn)
    .await?;
    let request = single_row(rows)?;
    debug!("🗃️ Payment request {} queued for order {}", request.id, request.order_id);
    Ok(request)
}

pub async fn fetch_payment_request(
    id: i64,
    conn: &mut SqliteConnection,
) -> Result<Option<PaymentRequest>, sqlx::Error> {
    sqlx::query_as("SELECT * FROM payment_requests WHERE id = $1").bind(id).fetch_optional(conn).await
}

/// Oldest PENDING requests first, so that no request is starved by newer ones.
pub async fn fetch_pending(limit: u32, conn: &mut SqliteConnection) -> Result<Vec<PaymentRequest>, sqlx::Error> {
    sqlx::query_as(
        r#"
        SELECT * FROM payment_requests
        WHERE status = 'PENDING'
        ORDER BY julianday(created_at) ASC, id ASC
        LIMIT $1;
        "#,
    )
    .bind(limit)
    .fetch_all(conn)
    .await
}

/// FAILED requests that have not yet exceeded the retry ceiling (`retry_count <= max_retries`).
pub async fn fetch_failed(
    limit: u32,
    max_retries: u32,
    conn: &mut SqliteConnection,
) -> Result<Vec<PaymentRequest>, sqlx::Error> {
    sqlx::query_as(
        r#"
        SELECT * FROM payment_requests
        WHERE status = 'FAILED' AND retry_count <= $1
        ORDER BY julianday(updated_at) ASC, id ASC
        LIMIT $2;
        "#,
    )
    .bind(max_retries)
    .bind(limit)
    .fetch_all(conn)
    .await
}

pub async fn mark_processed(id: i64, now: DateTime<Utc>, conn: &mut SqliteConnection) -> Result<bool, sqlx::Error> {
    let result =
        sqlx::query("UPDATE payment_requests SET status = 'PAID', updated_at = $1 WHERE id = $2 AND status = 'PENDING'")
            .bind(now)
            .bind(id)
            .execute(conn)
            .await?;
    Ok(result.rows_affected() > 0)
}

pub async fn mark_failed(
    id: i64,
    notes: &str,
    now: DateTime<Utc>,
    conn: &mut SqliteConnection,
) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        r#"
        UPDATE payment_requests SET status = 'FAILED', retry_count = retry_count + 1, notes = $1, updated_at = $2
        WHERE id = $3 AND status = 'PENDING';
        "#,
    )
    .bind(notes)
    .bind(now)
    .bind(id)
    .execute(conn)
    .await?;
    Ok(result.rows_affected() > 0)
}

pub async fn requeue(id: i64, now: DateTime<Utc>, conn: &mut SqliteConnection) -> Result<bool, sqlx::Error> {
    let result =
        sqlx::query("UPDATE payment_requests SET status = 'PENDING', updated_at = $1 WHERE id = $2 AND status = 'FAILED'")
            .bind(now)
            .bind(id)
            .execute(conn)
            .await?;
    Ok(result.rows_affected() > 0)
}
