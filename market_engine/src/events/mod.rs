//! Post-commit notifications.
//!
//! Events are only published after the database transaction that caused them has committed, so subscribers never see
//! a change that was later rolled back. Delivery is best-effort: a slow or failing subscriber never blocks or fails the
//! operation that published the event.
mod channel;
mod event_types;
mod hooks;

pub use channel::{EventHandler, EventProducer, Handler};
pub use event_types::*;
pub use hooks::{EventHandlers, EventHooks, EventProducers};
