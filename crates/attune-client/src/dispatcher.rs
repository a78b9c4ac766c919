//! Typed publish/subscribe bus keyed by event name.
//!
//! Listeners run synchronously on the publishing task, in registration
//! order. A listener that returns an error or panics is logged and skipped;
//! the remaining listeners still run and the registry is left intact.

use std::collections::HashMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::{trace, warn};

use crate::events::SessionEvent;

/// A registered callback. Registration identity is the `Arc` allocation.
pub type Listener<E> = Arc<dyn Fn(&E) -> anyhow::Result<()> + Send + Sync>;

/// Outcome of one [`EventDispatcher::publish`] call.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PublishReport {
    pub delivered: usize,
    pub failed: usize,
}

pub struct EventDispatcher<E = SessionEvent> {
    listeners: RwLock<HashMap<String, Vec<Listener<E>>>>,
}

impl<E> Default for EventDispatcher<E> {
    fn default() -> Self {
        Self {
            listeners: RwLock::new(HashMap::new()),
        }
    }
}

impl<E> EventDispatcher<E> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append `listener` for `event_type`. Registering the same listener
    /// twice means it runs twice.
    pub fn subscribe(&self, event_type: impl Into<String>, listener: Listener<E>) {
        self.listeners
            .write()
            .entry(event_type.into())
            .or_default()
            .push(listener);
    }

    /// Wrap a closure, subscribe it, and return the handle needed to
    /// unsubscribe it later.
    pub fn on<F>(&self, event_type: impl Into<String>, f: F) -> Listener<E>
    where
        F: Fn(&E) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        let listener: Listener<E> = Arc::new(f);
        self.subscribe(event_type, Arc::clone(&listener));
        listener
    }

    /// Remove the first registration of `listener` for `event_type`.
    /// Returns whether anything was removed.
    pub fn unsubscribe(&self, event_type: &str, listener: &Listener<E>) -> bool {
        let mut map = self.listeners.write();
        let Some(list) = map.get_mut(event_type) else {
            return false;
        };
        let Some(index) = list.iter().position(|l| Arc::ptr_eq(l, listener)) else {
            return false;
        };
        let _ = list.remove(index);
        if list.is_empty() {
            let _ = map.remove(event_type);
        }
        true
    }

    /// Invoke every listener currently registered for `event_type`.
    ///
    /// The listener list is snapshotted first, so listeners may subscribe or
    /// unsubscribe from inside a callback; such changes apply from the next
    /// publish on.
    pub fn publish(&self, event_type: &str, payload: &E) -> PublishReport {
        let snapshot: Vec<Listener<E>> = match self.listeners.read().get(event_type) {
            Some(list) => list.clone(),
            None => return PublishReport::default(),
        };

        let mut report = PublishReport::default();
        for (index, listener) in snapshot.iter().enumerate() {
            match catch_unwind(AssertUnwindSafe(|| listener(payload))) {
                Ok(Ok(())) => report.delivered += 1,
                Ok(Err(e)) => {
                    report.failed += 1;
                    warn!(event_type, listener = index, error = %e, "event listener failed");
                }
                Err(_) => {
                    report.failed += 1;
                    warn!(event_type, listener = index, "event listener panicked");
                }
            }
        }
        trace!(event_type, delivered = report.delivered, failed = report.failed, "published");
        report
    }

    pub fn listener_count(&self, event_type: &str) -> usize {
        self.listeners.read().get(event_type).map_or(0, Vec::len)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn counter() -> (Arc<AtomicUsize>, impl Fn(&u32) -> anyhow::Result<()> + Send + Sync) {
        let count = Arc::new(AtomicUsize::new(0));
        let c = Arc::clone(&count);
        (count, move |_: &u32| {
            let _ = c.fetch_add(1, Ordering::SeqCst);
            Ok(())
        })
    }

    #[test]
    fn publish_without_listeners_is_noop() {
        let d: EventDispatcher<u32> = EventDispatcher::new();
        assert_eq!(d.publish("nothing", &1), PublishReport::default());
    }

    #[test]
    fn listeners_run_in_registration_order() {
        let d: EventDispatcher<u32> = EventDispatcher::new();
        let order = Arc::new(parking_lot::Mutex::new(Vec::new()));
        for tag in ["a", "b", "c"] {
            let order = Arc::clone(&order);
            let _ = d.on("tick", move |_| {
                order.lock().push(tag);
                Ok(())
            });
        }
        let report = d.publish("tick", &0);
        assert_eq!(report.delivered, 3);
        assert_eq!(*order.lock(), vec!["a", "b", "c"]);
    }

    #[test]
    fn failing_listener_is_isolated() {
        let d: EventDispatcher<u32> = EventDispatcher::new();
        let _ = d.on("tick", |_| anyhow::bail!("listener exploded"));
        let (count, f) = counter();
        let _ = d.on("tick", f);

        let report = d.publish("tick", &0);
        assert_eq!(report, PublishReport { delivered: 1, failed: 1 });
        assert_eq!(count.load(Ordering::SeqCst), 1);

        // Registry untouched: the next publish behaves the same way.
        let _ = d.publish("tick", &0);
        assert_eq!(count.load(Ordering::SeqCst), 2);
        assert_eq!(d.listener_count("tick"), 2);
    }

    #[test]
    fn panicking_listener_is_isolated() {
        let d: EventDispatcher<u32> = EventDispatcher::new();
        let _ = d.on("tick", |_| panic!("listener panicked"));
        let (count, f) = counter();
        let _ = d.on("tick", f);

        let report = d.publish("tick", &0);
        assert_eq!(report, PublishReport { delivered: 1, failed: 1 });
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn duplicates_run_twice_and_unsubscribe_removes_one() {
        let d: EventDispatcher<u32> = EventDispatcher::new();
        let (count, f) = counter();
        let listener: Listener<u32> = Arc::new(f);
        d.subscribe("tick", Arc::clone(&listener));
        d.subscribe("tick", Arc::clone(&listener));

        let _ = d.publish("tick", &0);
        assert_eq!(count.load(Ordering::SeqCst), 2);

        assert!(d.unsubscribe("tick", &listener));
        let _ = d.publish("tick", &0);
        assert_eq!(count.load(Ordering::SeqCst), 3);

        assert!(d.unsubscribe("tick", &listener));
        assert!(!d.unsubscribe("tick", &listener));
        assert_eq!(d.listener_count("tick"), 0);
    }

    #[test]
    fn unsubscribe_other_type_is_false() {
        let d: EventDispatcher<u32> = EventDispatcher::new();
        let (_, f) = counter();
        let listener = d.on("a", f);
        assert!(!d.unsubscribe("b", &listener));
        assert_eq!(d.listener_count("a"), 1);
    }

    #[test]
    fn listener_may_unsubscribe_itself_during_publish() {
        let d: Arc<EventDispatcher<u32>> = Arc::new(EventDispatcher::new());
        let slot: Arc<parking_lot::Mutex<Option<Listener<u32>>>> =
            Arc::new(parking_lot::Mutex::new(None));

        let weak = Arc::downgrade(&d);
        let own = Arc::clone(&slot);
        let listener = d.on("once", move |_| {
            if let (Some(d), Some(me)) = (weak.upgrade(), own.lock().clone()) {
                let _ = d.unsubscribe("once", &me);
            }
            Ok(())
        });
        *slot.lock() = Some(listener);

        assert_eq!(d.publish("once", &0).delivered, 1);
        assert_eq!(d.publish("once", &0).delivered, 0);
    }
}
