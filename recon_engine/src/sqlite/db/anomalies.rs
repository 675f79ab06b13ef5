use chrono::{DateTime, Utc};
use sqlx::SqliteConnection;

use super::{optional_row, single_row};
use crate::db_types::{NewPaymentAnomaly, OrderId, PaymentAnomaly};

pub async fn insert_anomaly(
    anomaly: NewPaymentAnomaly,
    now: DateTime<Utc>,
    conn: &mut SqliteConnection,
) -> Result<PaymentAnomaly, sqlx::Error> {
    let rows: Vec<PaymentAnomaly> = sqlx::query_as(
        r#"
            INSERT INTO payment_anomalies (order_id, external_id, anomaly_type, notes, status, created_at, updated_at)
            VALUES ($1, $2, $3, $4, 'NEEDS_REVIEW', $5, $5)
            RETURNING *;
        "#,
    )
    .bind(anomaly.order_id)
    .bind(anomaly.external_id)
    .bind(anomaly.anomaly_type)
    .bind(anomaly.notes)
    .bind(now)
    .fetch_all(conn)
    .await?;
    single_row(rows)
}

pub async fn fetch_for_order(
    order_id: OrderId,
    conn: &mut SqliteConnection,
) -> Result<Vec<PaymentAnomaly>, sqlx::Error> {
    sqlx::query_as("SELECT * FROM payment_anomalies WHERE order_id = $1 ORDER BY id ASC")
        .bind(order_id)
        .fetch_all(conn)
        .await
}

/// Closes an anomaly that still needs review, appending the operator's notes to the existing ones.
pub async fn resolve(
    id: i64,
    notes: &str,
    now: DateTime<Utc>,
    conn: &mut SqliteConnection,
) -> Result<Option<PaymentAnomaly>, sqlx::Error> {
    let rows: Vec<PaymentAnomaly> = sqlx::query_as(
        r#"
        UPDATE payment_anomalies
        SET status = 'RESOLVED',
            notes = CASE WHEN $1 = '' THEN notes ELSE notes || '; resolved: ' || $1 END,
            updated_at = $2
        WHERE id = $3 AND status = 'NEEDS_REVIEW'
        RETURNING *;
        "#,
    )
    .bind(notes)
    .bind(now)
    .bind(id)
    .fetch_all(conn)
    .await?;
    Ok(optional_row(rows))
}
