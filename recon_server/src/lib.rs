//! # Reconciliation server
//! This crate hosts the HTTP server and background workers for the payment reconciliation engine. It is responsible
//! for:
//! * Receiving payment notifications from the gateway (Xendit) and applying them through the engine.
//! * Opening invoices, directly or by queueing payment requests, for new orders.
//! * Running the background loops: the pending-invoice poll, the payment request drain, payment expiry and,
//!   optionally, the order-created consumer.
//! * Giving operators a small API to inspect payments and resolve quarantined records.
//!
//! ## Configuration
//! The server is configured via environment variables. See [config](config/index.html) for more information.
//!
//! ## Routes
//! The server exposes the following routes:
//! * `/health`: A health check route that returns a 200 OK response.
//! * `/ping`: Returns `{"message":"pong"}`.
//! * `/v1/payment/webhook`: The gateway's payment notification webhook. Requires `x-callback-token`.
//! * `/api/...`: Operator routes. Require `x-api-token`. See [routes](routes/index.html).

pub mod cli;
pub mod config;
pub mod data_objects;
pub mod errors;
pub mod integrations;
pub mod middleware;
pub mod routes;
pub mod server;
pub mod workers;

#[cfg(test)]
mod endpoint_tests;
