//! Core engine modules - listeners, request cache, events, workers
//!
//! These modules are independent of any view layer.

pub mod editor_events;
pub mod event_bus;
pub mod listeners;
pub mod request_cache;
pub mod workers;

// Re-exports for convenience
pub use event_bus::{BoxedEvent, EventBus, EventSink, downcast_event};
pub use listeners::{ListenerId, Listeners};
pub use request_cache::{RequestCache, Responder, Settled, Waiter};
pub use workers::Workers;
