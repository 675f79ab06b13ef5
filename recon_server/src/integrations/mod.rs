pub mod alerts;
pub mod event_bus;
pub mod xendit;
