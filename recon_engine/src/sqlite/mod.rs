//! SQLite backend for the reconciliation engine.
//!
//! Migrations live in `migrations/` next to this file and are embedded with `sqlx::migrate!`.
mod sqlite_impl;

pub mod db;
pub use sqlite_impl::SqliteDatabase;
