//! Pub/Sub Event Bus for editor-wide signals.
//!
//! Carries the signals the core emits but never handles itself:
//! render requests, error announcements, file and mutation notices.
//!
//! - Subscribers run inside emit(), on the emitting thread
//! - Every emitted event is also queued; poll() hands the queue to the owner
//!   so it can route events to state a callback cannot capture (form lists)
//!
//! Callback order: FIFO within same event type.
//! Cross-type order undefined - don't rely on ordering between different event types.

use log::warn;
use std::any::{Any, TypeId};
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, RwLock};

/// Queued events kept before the oldest are dropped
const QUEUE_CAPACITY: usize = 1000;

/// Marker trait for events. Events must be Send + Sync + 'static.
pub trait Event: Any + Send + Sync + 'static {
    fn as_any(&self) -> &dyn Any;
    fn type_name(&self) -> &'static str;
}

impl<T: Any + Send + Sync + 'static> Event for T {
    fn as_any(&self) -> &dyn Any {
        self
    }
    fn type_name(&self) -> &'static str {
        std::any::type_name::<T>()
    }
}

type Handler = Arc<dyn Fn(&dyn Any) + Send + Sync>;

/// Boxed event for queue storage
pub type BoxedEvent = Box<dyn Event>;

#[derive(Default)]
struct Shared {
    handlers: RwLock<HashMap<TypeId, Vec<Handler>>>,
    queue: Mutex<VecDeque<BoxedEvent>>,
}

/// Typed pub/sub with a deferred queue. Clones share one bus.
#[derive(Clone, Default)]
pub struct EventBus {
    shared: Arc<Shared>,
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBus")
            .field("event_types", &self.shared.handlers.read().map(|h| h.len()).unwrap_or(0))
            .field("queued", &self.queue_len())
            .finish()
    }
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Subscribe to events of type E.
    ///
    /// # Example
    /// ```ignore
    /// bus.subscribe::<Announcement, _>(|a| eprintln!("{}", a.0));
    /// ```
    pub fn subscribe<E, F>(&self, callback: F)
    where
        E: Event,
        F: Fn(&E) + Send + Sync + 'static,
    {
        let handler: Handler = Arc::new(move |any: &dyn Any| {
            if let Some(event) = any.downcast_ref::<E>() {
                callback(event);
            }
        });
        self.shared
            .handlers
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .entry(TypeId::of::<E>())
            .or_default()
            .push(handler);
    }

    /// Run subscribers for E, then queue the event for poll().
    pub fn emit<E: Event>(&self, event: E) {
        // Clone the handler list so a subscriber may subscribe without deadlocking
        let handlers = self
            .shared
            .handlers
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(&TypeId::of::<E>())
            .cloned()
            .unwrap_or_default();
        for handler in &handlers {
            handler(&event);
        }

        let mut queue = self.shared.queue.lock().unwrap_or_else(|e| e.into_inner());
        if queue.len() >= QUEUE_CAPACITY {
            let evict = queue.len() / 2;
            warn!("EventBus queue full, dropping oldest {}", evict);
            queue.drain(..evict);
        }
        queue.push_back(Box::new(event));
    }

    /// Take all queued events in emission order.
    pub fn poll(&self) -> Vec<BoxedEvent> {
        let mut queue = self.shared.queue.lock().unwrap_or_else(|e| e.into_inner());
        queue.drain(..).collect()
    }

    pub fn queue_len(&self) -> usize {
        self.shared.queue.lock().map(|q| q.len()).unwrap_or(0)
    }
}

/// Emit side of the bus; a no-op until wired to one.
///
/// List fields and caches are built without a bus in tests, so they hold
/// one of these rather than an `Option<EventBus>`.
#[derive(Clone, Default, Debug)]
pub struct EventSink {
    bus: Option<EventBus>,
}

impl EventSink {
    /// Create a no-op sink
    pub fn dummy() -> Self {
        Self { bus: None }
    }

    pub fn from_bus(bus: &EventBus) -> Self {
        Self { bus: Some(bus.clone()) }
    }

    pub fn is_connected(&self) -> bool {
        self.bus.is_some()
    }

    pub fn emit<E: Event>(&self, event: E) {
        if let Some(bus) = &self.bus {
            bus.emit(event);
        }
    }
}

/// Downcast a polled event to a concrete type.
///
/// Derefs to `dyn Event` first: calling `as_any()` on the box itself would
/// pick the blanket impl for `Box<dyn Event>` and never match.
#[inline]
pub fn downcast_event<E: Event>(event: &BoxedEvent) -> Option<&E> {
    (**event).as_any().downcast_ref::<E>()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicI32, Ordering};

    #[derive(Clone, Debug)]
    struct Ping {
        value: i32,
    }

    #[derive(Clone, Debug)]
    struct Other;

    #[test]
    fn test_subscriber_runs_on_emit() {
        let bus = EventBus::new();
        let counter = Arc::new(AtomicI32::new(0));
        let c = Arc::clone(&counter);

        bus.subscribe::<Ping, _>(move |e| {
            c.fetch_add(e.value, Ordering::SeqCst);
        });

        bus.emit(Ping { value: 10 });
        bus.emit(Other);
        bus.emit(Ping { value: 5 });
        assert_eq!(counter.load(Ordering::SeqCst), 15);
    }

    #[test]
    fn test_poll_preserves_order_and_drains() {
        let bus = EventBus::new();
        bus.emit(Ping { value: 1 });
        bus.emit(Other);

        let events = bus.poll();
        assert_eq!(events.len(), 2);
        assert_eq!(downcast_event::<Ping>(&events[0]).map(|p| p.value), Some(1));
        assert!(downcast_event::<Other>(&events[1]).is_some());
        assert!(downcast_event::<Ping>(&events[1]).is_none());
        assert!(bus.poll().is_empty());
    }

    #[test]
    fn test_full_queue_drops_oldest() {
        let bus = EventBus::new();
        for value in 0..QUEUE_CAPACITY as i32 + 1 {
            bus.emit(Ping { value });
        }
        let events = bus.poll();
        assert_eq!(events.len(), QUEUE_CAPACITY / 2 + 1);
        let last = events.last().and_then(|e| downcast_event::<Ping>(e)).map(|p| p.value);
        assert_eq!(last, Some(QUEUE_CAPACITY as i32));
    }

    #[test]
    fn test_sink_dummy_is_noop() {
        let sink = EventSink::dummy();
        sink.emit(Ping { value: 3 });
        assert!(!sink.is_connected());
    }

    #[test]
    fn test_sink_reaches_bus() {
        let bus = EventBus::new();
        let sink = EventSink::from_bus(&bus);
        sink.emit(Ping { value: 42 });
        assert!(sink.is_connected());
        assert_eq!(bus.queue_len(), 1);
    }
}
