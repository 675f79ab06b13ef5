//! Events emitted by the reconciliation engine.
//!
//! [`PaymentSuccessEvent`] is the message that goes out on the event bus. The other events are in-process
//! notifications that callers can subscribe to via [`EventHooks`].
mod channel;
mod event_types;
mod hooks;

pub use channel::{EventHandler, EventProducer, Handler};
pub use event_types::*;
pub use hooks::{EventHandlers, EventHooks, EventProducers};
