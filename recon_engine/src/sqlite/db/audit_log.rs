use chrono::{DateTime, Utc};
use sqlx::SqliteConnection;

use super::single_row;
use crate::db_types::{AuditEntry, NewAuditEntry, OrderId};

pub async fn append(entry: NewAuditEntry, now: DateTime<Utc>, conn: &mut SqliteConnection) -> Result<i64, sqlx::Error> {
    let metadata = entry.metadata.map(|m| m.to_string());
    let ids: Vec<i64> = sqlx::query_scalar(
        r#"
            INSERT INTO payment_audit_logs (order_id, payment_id, user_id, external_id, event, actor, metadata, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING id;
        "#,
    )
    .bind(entry.order_id)
    .bind(entry.payment_id)
    .bind(entry.user_id)
    .bind(entry.external_id)
    .bind(entry.event)
    .bind(entry.actor)
    .bind(metadata)
    .bind(now)
    .fetch_all(conn)
    .await?;
    single_row(ids)
}

pub async fn fetch_for_order(order_id: OrderId, conn: &mut SqliteConnection) -> Result<Vec<AuditEntry>, sqlx::Error> {
    sqlx::query_as("SELECT * FROM payment_audit_logs WHERE order_id = $1 ORDER BY id ASC")
        .bind(order_id)
        .fetch_all(conn)
        .await
}
