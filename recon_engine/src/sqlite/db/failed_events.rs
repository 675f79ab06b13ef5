use chrono::{DateTime, Utc};
use sqlx::SqliteConnection;

use super::{optional_row, single_row};
use crate::db_types::{FailedEvent, NewFailedEvent, OrderId};

pub async fn insert_failed_event(
    event: NewFailedEvent,
    now: DateTime<Utc>,
    conn: &mut SqliteConnection,
) -> Result<FailedEvent, sqlx::Error> {
    let rows: Vec<FailedEvent> = sqlx::query_as(
        r#"
            INSERT INTO failed_events (order_id, external_id, failed_type, notes, status, created_at, updated_at)
            VALUES ($1, $2, $3, $4, 'NEEDS_REVIEW', $5, $5)
            RETURNING *;
        "#,
    )
    .bind(event.order_id)
    .bind(event.external_id)
    .bind(event.failed_type)
    .bind(event.notes)
    .bind(now)
    .fetch_all(conn)
    .await?;
    single_row(rows)
}

pub async fn fetch_for_order(order_id: OrderId, conn: &mut SqliteConnection) -> Result<Vec<FailedEvent>, sqlx::Error> {
    sqlx::query_as("SELECT * FROM failed_events WHERE order_id = $1 ORDER BY id ASC")
        .bind(order_id)
        .fetch_all(conn)
        .await
}

pub async fn resolve(
    id: i64,
    notes: &str,
    now: DateTime<Utc>,
    conn: &mut SqliteConnection,
) -> Result<Option<FailedEvent>, sqlx::Error> {
    let rows: Vec<FailedEvent> = sqlx::query_as(
        r#"
        UPDATE failed_events
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
