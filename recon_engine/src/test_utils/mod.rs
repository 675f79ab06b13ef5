//! Helpers for tests that need a real database, or stand-ins for the gateway and the event bus.
pub mod fakes;
pub mod prepare_env;
