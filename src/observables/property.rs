//! Observable value cell.
//!
//! [`Property<V>`] holds a value and publishes a [`ValueChange`] with the old
//! and new value on every write. The value lives inside the critical section
//! of the property's handler table, so a write, the event it produces, and
//! the fan-out of that event form one atomic step:
//!
//! - concurrent writers are serialized, and each event describes exactly
//!   one write;
//! - readers see either the value before or after a write, never a mix;
//! - handlers run synchronously by an immediate scheduler can read or write
//!   the property again from inside the callback.

use std::fmt;

use parking_lot::Mutex;

use super::bindable::Bindable;
use crate::events::{EventPublisher, HandlerTable, ValueChange};

/// A value that can be observed for changes.
///
/// Share it behind an `Arc` to observe and mutate it from several places.
pub struct Property<V> {
    /// Only touched while `handlers` is entered.
    value: Mutex<V>,
    handlers: HandlerTable<ValueChange<V>>,
}

impl<V: fmt::Debug> fmt::Debug for Property<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let _section = self.handlers.enter();
        f.debug_struct("Property")
            .field("value", &*self.value.lock())
            .field("handlers", &self.handlers.len())
            .finish()
    }
}

impl<V: Default> Default for Property<V> {
    fn default() -> Self {
        Self::new(V::default())
    }
}

impl<V> Property<V> {
    /// Creates a property holding `value`
    pub fn new(value: V) -> Self {
        Self {
            value: Mutex::new(value),
            handlers: HandlerTable::new(),
        }
    }

    /// Reads the value by reference without cloning.
    ///
    /// # Deadlocks
    ///
    /// The value stays locked while `f` runs. Reading or writing this
    /// property from inside `f`, directly or through a handler, deadlocks
    /// the calling thread. Use [`get`](Property::get) when `f` needs to.
    pub fn with<R>(&self, f: impl FnOnce(&V) -> R) -> R {
        let _section = self.handlers.enter();
        let value = self.value.lock();
        f(&value)
    }

    /// Replaces the value without publishing an event.
    ///
    /// The next published event reports the silently written value as its
    /// `old_value`.
    pub fn silently_update(&self, value: V) {
        let _section = self.handlers.enter();
        *self.value.lock() = value;
    }
}

impl<V: Clone + Send + 'static> Property<V> {
    /// Returns a clone of the current value
    pub fn get(&self) -> V {
        let _section = self.handlers.enter();
        self.value.lock().clone()
    }

    /// Replaces the value and publishes the change.
    ///
    /// An event is published for every call, including writes of an equal
    /// value.
    pub fn set(&self, value: V) {
        let _section = self.handlers.enter();
        let old_value = std::mem::replace(&mut *self.value.lock(), value.clone());
        self.publish(ValueChange::new(old_value, value));
    }

    /// Modifies a copy of the value and publishes the change.
    ///
    /// `f` runs on a copy with the value unlocked, so it may read this
    /// property; it sees the value from before the update. A write made from
    /// inside `f` is overwritten by the result of `f`.
    pub fn update(&self, f: impl FnOnce(&mut V)) {
        let _section = self.handlers.enter();
        let old_value = self.value.lock().clone();
        let mut new_value = old_value.clone();
        f(&mut new_value);
        *self.value.lock() = new_value.clone();
        self.publish(ValueChange::new(old_value, new_value));
    }
}

impl<V: Clone + Send + 'static> EventPublisher for Property<V> {
    type Event = ValueChange<V>;

    fn event_handlers(&self) -> &HandlerTable<ValueChange<V>> {
        &self.handlers
    }
}

impl<V: Clone + Send + 'static> Bindable for Property<V> {
    type Value = V;

    fn value(&self) -> V {
        self.get()
    }

    fn set_value(&self, value: V) {
        self.set(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn recorder<V: Clone + Send + 'static>(
        property: &Property<V>,
    ) -> Arc<Mutex<Vec<ValueChange<V>>>> {
        let events = Arc::new(Mutex::new(Vec::new()));
        let log = events.clone();
        property.add_event_handler(move |event: &ValueChange<V>| log.lock().push(event.clone()));
        events
    }

    #[test]
    fn test_get_set_basic() {
        let property = Property::new(42);
        assert_eq!(property.get(), 42);

        property.set(99);
        assert_eq!(property.get(), 99);
        assert_eq!(property.value(), 99);
    }

    #[test]
    fn test_events_chain_old_and_new_values() {
        let property = Property::new("A".to_string());
        let events = recorder(&property);

        property.set("B".to_string());
        property.set("C".to_string());

        assert_eq!(
            *events.lock(),
            vec![
                ValueChange::new("A".to_string(), "B".to_string()),
                ValueChange::new("B".to_string(), "C".to_string()),
            ]
        );
    }

    #[test]
    fn test_equal_write_is_still_published() {
        let property = Property::new(1);
        let events = recorder(&property);

        property.set(1);
        assert_eq!(*events.lock(), vec![ValueChange::new(1, 1)]);
    }

    #[test]
    fn test_removed_handler_is_not_invoked() {
        let property = Property::new(0);
        let calls = Arc::new(AtomicUsize::new(0));
        let c = calls.clone();
        let token = property.add_event_handler(move |_| {
            c.fetch_add(1, Ordering::SeqCst);
        });

        property.set(1);
        property.remove_event_handler(token);
        property.set(2);

        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_silent_update_publishes_nothing() {
        let property = Property::new(1);
        let events = recorder(&property);

        property.silently_update(2);
        assert!(events.lock().is_empty());
        assert_eq!(property.get(), 2);

        property.set(3);
        assert_eq!(*events.lock(), vec![ValueChange::new(2, 3)]);
    }

    #[test]
    fn test_update_in_place() {
        let property = Property::new(vec![1, 2, 3]);
        let events = recorder(&property);

        property.update(|v| v.push(4));

        assert_eq!(property.get(), vec![1, 2, 3, 4]);
        assert_eq!(
            *events.lock(),
            vec![ValueChange::new(vec![1, 2, 3], vec![1, 2, 3, 4])]
        );
    }

    #[test]
    fn test_update_closure_can_read_property() {
        let property = Arc::new(Property::new(5));
        let events = recorder(&property);

        let reader = property.clone();
        property.update(|v| *v += reader.get());

        assert_eq!(property.get(), 10);
        assert_eq!(*events.lock(), vec![ValueChange::new(5, 10)]);
    }

    #[test]
    fn test_with_access() {
        let property = Property::new(vec![1, 2, 3]);
        let sum = property.with(|v| v.iter().sum::<i32>());
        assert_eq!(sum, 6);
    }

    #[test]
    fn test_handler_can_read_property_during_publish() {
        let property = Arc::new(Property::new(10));
        let seen = Arc::new(Mutex::new(None));

        let weak = Arc::downgrade(&property);
        let slot = seen.clone();
        property.add_event_handler(move |_| {
            if let Some(property) = weak.upgrade() {
                *slot.lock() = Some(property.get());
            }
        });

        property.set(11);
        assert_eq!(*seen.lock(), Some(11));
    }

    #[test]
    fn test_handler_can_write_property_during_publish() {
        let property = Arc::new(Property::new(0));
        let events = recorder(&property);

        let weak = Arc::downgrade(&property);
        property.add_event_handler(move |event: &ValueChange<i32>| {
            if event.new_value == 1 {
                if let Some(property) = weak.upgrade() {
                    property.set(2);
                }
            }
        });

        property.set(1);

        assert_eq!(property.get(), 2);
        assert!(events.lock().contains(&ValueChange::new(1, 2)));
        assert_eq!(events.lock().len(), 2);
    }

    #[test]
    fn test_default_and_debug() {
        let property: Property<String> = Property::default();
        assert_eq!(property.get(), "");

        let dbg = format!("{:?}", Property::new(42));
        assert!(dbg.contains("Property"));
        assert!(dbg.contains("42"));
    }
}
