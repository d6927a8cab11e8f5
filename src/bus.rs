//! In-process publish/subscribe channel for suggested questions.
//!
//! Content widgets publish a [`QuestionEvent`] when a visitor picks one of
//! their suggested questions; the conversation engine subscribes and turns
//! each event into a submission.  Neither side holds a reference to the
//! other, only to a shared [`QuestionBus`] owned by the application.
//!
//! Delivery is synchronous, in registration order, and fire-and-forget: if
//! nobody is subscribed the event is simply dropped.

use std::cell::Cell;
use std::fmt;
use std::sync::{Arc, Mutex, PoisonError, Weak};

use crate::observability::{BUS_DELIVERIES, BUS_DROPPED, BUS_PUBLISHES};
use crate::types::QuestionEvent;

/// How deeply handlers may publish from within a publish on one thread.
pub const MAX_PUBLISH_DEPTH: usize = 4;

thread_local! {
    static PUBLISH_DEPTH: Cell<usize> = const { Cell::new(0) };
}

type Handler = Arc<dyn Fn(&QuestionEvent) + Send + Sync>;

#[derive(Default)]
struct Registry {
    next_id: u64,
    handlers: Vec<(u64, Handler)>,
}

/// The question channel.
///
/// Cloning is cheap; clones share the same subscriber registry.
#[derive(Clone, Default)]
pub struct QuestionBus {
    registry: Arc<Mutex<Registry>>,
}

impl QuestionBus {
    /// Creates a bus with no subscribers.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `handler` and returns the capability that deregisters it.
    ///
    /// The handler stays registered until the [`Subscription`] is dropped or
    /// [`Subscription::unsubscribe`] is called.
    pub fn subscribe<F>(&self, handler: F) -> Subscription
    where
        F: Fn(&QuestionEvent) + Send + Sync + 'static,
    {
        let mut registry = self.lock();
        let id = registry.next_id;
        registry.next_id += 1;
        registry.handlers.push((id, Arc::new(handler)));
        Subscription {
            registry: Arc::downgrade(&self.registry),
            id,
        }
    }

    /// Broadcasts `question` to every current subscriber.
    ///
    /// Returns the number of handlers that ran.
    pub fn publish(&self, question: impl Into<String>) -> usize {
        self.publish_event(&QuestionEvent::new(question))
    }

    /// Broadcasts an already-built event to every current subscriber.
    ///
    /// Handlers run outside the registry lock, so a handler may subscribe,
    /// unsubscribe, or publish again.  Nested publishes beyond
    /// [`MAX_PUBLISH_DEPTH`] are dropped.
    pub fn publish_event(&self, event: &QuestionEvent) -> usize {
        let Some(_depth) = DepthGuard::enter() else {
            BUS_DROPPED.click();
            tracing::warn!(
                question = %event.question,
                "nested question publish exceeded depth {MAX_PUBLISH_DEPTH}; dropped"
            );
            return 0;
        };
        BUS_PUBLISHES.click();
        // Snapshot so handlers registered mid-publish wait for the next event.
        let handlers: Vec<Handler> = self
            .lock()
            .handlers
            .iter()
            .map(|(_, handler)| Arc::clone(handler))
            .collect();
        for handler in &handlers {
            handler(event);
            BUS_DELIVERIES.click();
        }
        handlers.len()
    }

    /// Returns the number of registered subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.lock().handlers.len()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Registry> {
        self.registry.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl fmt::Debug for QuestionBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QuestionBus")
            .field("subscribers", &self.subscriber_count())
            .finish()
    }
}

/// Deregistration capability returned by [`QuestionBus::subscribe`].
pub struct Subscription {
    registry: Weak<Mutex<Registry>>,
    id: u64,
}

impl Subscription {
    /// Deregisters the handler now.
    pub fn unsubscribe(self) {
        drop(self)
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(registry) = self.registry.upgrade() {
            let mut registry = registry.lock().unwrap_or_else(PoisonError::into_inner);
            registry.handlers.retain(|(id, _)| *id != self.id);
        }
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription").field("id", &self.id).finish()
    }
}

struct DepthGuard;

impl DepthGuard {
    fn enter() -> Option<Self> {
        PUBLISH_DEPTH.with(|depth| {
            if depth.get() >= MAX_PUBLISH_DEPTH {
                None
            } else {
                depth.set(depth.get() + 1);
                Some(DepthGuard)
            }
        })
    }
}

impl Drop for DepthGuard {
    fn drop(&mut self) {
        PUBLISH_DEPTH.with(|depth| depth.set(depth.get().saturating_sub(1)));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn recorder(
        bus: &QuestionBus,
        label: &'static str,
        log: &Arc<Mutex<Vec<String>>>,
    ) -> Subscription {
        let log = Arc::clone(log);
        bus.subscribe(move |event| {
            log.lock().unwrap().push(format!("{label}:{}", event.question));
        })
    }

    #[test]
    fn publish_without_subscribers_is_dropped() {
        let bus = QuestionBus::new();
        assert_eq!(bus.publish("anyone?"), 0);
    }

    #[test]
    fn delivers_in_registration_order() {
        let bus = QuestionBus::new();
        let log = Arc::new(Mutex::new(Vec::new()));
        let _a = recorder(&bus, "a", &log);
        let _b = recorder(&bus, "b", &log);

        assert_eq!(bus.publish("Tell me about your internship"), 2);
        assert_eq!(
            *log.lock().unwrap(),
            vec![
                "a:Tell me about your internship".to_string(),
                "b:Tell me about your internship".to_string(),
            ]
        );
    }

    #[test]
    fn dropping_subscription_deregisters() {
        let bus = QuestionBus::new();
        let log = Arc::new(Mutex::new(Vec::new()));
        let a = recorder(&bus, "a", &log);
        let b = recorder(&bus, "b", &log);
        assert_eq!(bus.subscriber_count(), 2);

        drop(a);
        b.unsubscribe();
        assert_eq!(bus.subscriber_count(), 0);
        assert_eq!(bus.publish("hello"), 0);
        assert!(log.lock().unwrap().is_empty());
    }

    #[test]
    fn clones_share_subscribers() {
        let bus = QuestionBus::new();
        let widget_side = bus.clone();
        let hits = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&hits);
        let _sub = bus.subscribe(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        widget_side.publish("one");
        widget_side.publish("two");
        assert_eq!(hits.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn subscription_outliving_bus_is_harmless() {
        let bus = QuestionBus::new();
        let sub = bus.subscribe(|_| {});
        drop(bus);
        drop(sub);
    }

    #[test]
    fn recursive_publish_is_bounded() {
        let bus = QuestionBus::new();
        let hits = Arc::new(AtomicUsize::new(0));
        let inner_bus = bus.clone();
        let counter = Arc::clone(&hits);
        let _sub = bus.subscribe(move |event| {
            counter.fetch_add(1, Ordering::SeqCst);
            inner_bus.publish_event(event);
        });

        assert_eq!(bus.publish("echo"), 1);
        assert_eq!(hits.load(Ordering::SeqCst), MAX_PUBLISH_DEPTH);
        // Depth is released once the outermost publish returns.
        assert_eq!(bus.publish("echo"), 1);
        assert_eq!(hits.load(Ordering::SeqCst), 2 * MAX_PUBLISH_DEPTH);
    }

    #[test]
    fn handler_may_unsubscribe_during_publish() {
        let bus = QuestionBus::new();
        let slot: Arc<Mutex<Option<Subscription>>> = Arc::new(Mutex::new(None));
        let hits = Arc::new(AtomicUsize::new(0));
        let own = Arc::clone(&slot);
        let counter = Arc::clone(&hits);
        let sub = bus.subscribe(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
            own.lock().unwrap().take();
        });
        *slot.lock().unwrap() = Some(sub);

        assert_eq!(bus.publish("once"), 1);
        assert_eq!(bus.publish("twice"), 0);
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }
}
