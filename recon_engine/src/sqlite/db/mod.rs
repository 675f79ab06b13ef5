//! # SQLite Database methods
//!
//! This module contains "low-level" SQLite database interactions.
//!
//! All these interactions are simple functions (rather than stateful structs) that accept a `&mut SqliteConnection`
//! argument. Callers can obtain a connection from a pool, or open an atomic transaction as the need arises and call
//! through to the functions without any other changes.
//!
//! Writes with a `RETURNING` clause are always read with `fetch_all`. SQLite only completes the statement once every
//! row has been stepped, and until then the write is not visible to other connections in the pool. Use
//! `single_row` or `optional_row` to pick the result out.
//!
//! Timestamps are always bound from Rust, and compared with `julianday(..)` so that differently formatted (but
//! equivalent) timestamp strings compare correctly.
use std::env;

use log::info;
use sqlx::{sqlite::SqlitePoolOptions, Error as SqlxError, SqlitePool};

pub mod anomalies;
pub mod audit_log;
pub mod failed_events;
pub mod payment_requests;
pub mod payments;

const SQLITE_DB_URL: &str = "sqlite://data/recon_store.db";

pub fn db_url() -> String {
    let result = env::var("RECON_DATABASE_URL").unwrap_or_else(|_| {
        info!("🗃️ RECON_DATABASE_URL is not set. Using the default.");
        SQLITE_DB_URL.to_string()
    });
    info!("🗃️ Using database URL: {result}");
    result
}

pub async fn new_pool(url: &str, max_connections: u32) -> Result<SqlitePool, SqlxError> {
    let pool = SqlitePoolOptions::new().max_connections(max_connections).connect(url).await?;
    Ok(pool)
}

pub(crate) fn is_unique_violation(e: &SqlxError) -> bool {
    matches!(e, SqlxError::Database(db) if db.is_unique_violation())
}

/// The one row a `RETURNING` insert produced.
pub(crate) fn single_row<T>(rows: Vec<T>) -> Result<T, SqlxError> {
    rows.into_iter().next().ok_or(SqlxError::RowNotFound)
}

/// The row a guarded `RETURNING` update produced, if the guard matched.
pub(crate) fn optional_row<T>(rows: Vec<T>) -> Option<T> {
    rows.into_iter().next()
}
