//--------------------------------------------------------------------------------------------------
// MODULE OVERVIEW
//--------------------------------------------------------------------------------------------------
// Bridge from dynamically typed, key-addressed objects to statically typed value-change events.
// The runtime downcast from `dyn Any` to the expected value type happens here and nowhere else.
//
// | Component           | Description                                                 |
// |---------------------|-------------------------------------------------------------|
// | KeyValueObservable  | Capability of an object exposing observable keyed values    |
// | PropertyBag         | In-process KeyValueObservable with declared keys            |
// | DynamicProperty     | EventPublisher + Bindable over one key of such an object    |
//--------------------------------------------------------------------------------------------------

use std::any::{Any, type_name};
use std::collections::HashMap;
use std::fmt;
use std::marker::PhantomData;
use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use tracing::debug;
use uuid::Uuid;

use super::bindable::Bindable;
use crate::events::{EventError, EventPublisher, EventResult, HandlerTable, ValueChange};

/// A dynamically typed value stored under a key
pub type DynValue = Arc<dyn Any + Send + Sync>;

/// Callback invoked with `(key, old_value, new_value)` whenever a key changes
pub type KeyObserver = Arc<dyn Fn(&str, &DynValue, &DynValue) + Send + Sync + 'static>;

/// Objects whose values are addressed by string keys and can be observed.
pub trait KeyValueObservable: Send + Sync + 'static {
    /// Returns the value stored under `key`
    fn value_for_key(&self, key: &str) -> EventResult<DynValue>;

    /// Stores `value` under `key` and notifies the key's observers
    fn set_value_for_key(&self, key: &str, value: DynValue) -> EventResult<()>;

    /// Registers `observer` for changes of `key`
    fn add_key_observer(&self, key: &str, observer: KeyObserver) -> Uuid;

    /// Unregisters an observer; unknown ids are ignored
    fn remove_key_observer(&self, key: &str, id: Uuid);
}

/// A declared key: its current value and the name of its declared type
struct Slot {
    value: DynValue,
    type_name: &'static str,
}

#[derive(Default)]
struct BagState {
    values: HashMap<String, Slot>,
    observers: HashMap<String, Vec<(Uuid, KeyObserver)>>,
}

/// A thread-safe key-value object.
///
/// Keys are declared with [`insert`](Self::insert). Writing an undeclared
/// key, or a value whose runtime type differs from the declared one, fails.
/// Observers run after the bag's lock is released.
#[derive(Default)]
pub struct PropertyBag {
    state: Mutex<BagState>,
}

impl fmt::Debug for PropertyBag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.lock();
        let mut keys: Vec<&String> = state.values.keys().collect();
        keys.sort();
        f.debug_struct("PropertyBag").field("keys", &keys).finish()
    }
}

impl PropertyBag {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declares `key` with an initial value, replacing any previous declaration.
    ///
    /// No observer is notified.
    pub fn insert<V: Any + Send + Sync>(&self, key: impl Into<String>, value: V) {
        let slot = Slot {
            value: Arc::new(value),
            type_name: type_name::<V>(),
        };
        let previous = self.state.lock().values.insert(key.into(), slot);
        drop(previous);
    }

    /// Typed read of `key`
    pub fn get<V: Any + Send + Sync + Clone>(&self, key: &str) -> EventResult<V> {
        let value = self.value_for_key(key)?;
        downcast_value(key, &value)
    }

    /// Typed write of `key`
    pub fn set<V: Any + Send + Sync>(&self, key: &str, value: V) -> EventResult<()> {
        self.set_value_for_key(key, Arc::new(value))
    }

    /// Number of observers registered for `key`
    pub fn observer_count(&self, key: &str) -> usize {
        self.state.lock().observers.get(key).map_or(0, Vec::len)
    }
}

impl KeyValueObservable for PropertyBag {
    fn value_for_key(&self, key: &str) -> EventResult<DynValue> {
        self.state
            .lock()
            .values
            .get(key)
            .map(|slot| Arc::clone(&slot.value))
            .ok_or_else(|| EventError::UnknownKey(key.to_string()))
    }

    fn set_value_for_key(&self, key: &str, value: DynValue) -> EventResult<()> {
        let (old_value, observers) = {
            let mut state = self.state.lock();
            let slot = state
                .values
                .get_mut(key)
                .ok_or_else(|| EventError::UnknownKey(key.to_string()))?;

            if (*slot.value).type_id() != (*value).type_id() {
                return Err(EventError::TypeMismatch {
                    key: key.to_string(),
                    expected: slot.type_name,
                });
            }

            let old_value = std::mem::replace(&mut slot.value, Arc::clone(&value));
            let observers: Vec<KeyObserver> = state
                .observers
                .get(key)
                .map(|list| list.iter().map(|(_, observer)| Arc::clone(observer)).collect())
                .unwrap_or_default();
            (old_value, observers)
        };

        for observer in observers {
            observer(key, &old_value, &value);
        }
        Ok(())
    }

    fn add_key_observer(&self, key: &str, observer: KeyObserver) -> Uuid {
        let id = Uuid::new_v4();
        self.state
            .lock()
            .observers
            .entry(key.to_string())
            .or_default()
            .push((id, observer));
        id
    }

    fn remove_key_observer(&self, key: &str, id: Uuid) {
        // Dropped after the lock is released.
        let removed = {
            let mut state = self.state.lock();
            let Some(list) = state.observers.get_mut(key) else {
                return;
            };
            let removed = list
                .iter()
                .position(|(observer_id, _)| *observer_id == id)
                .map(|index| list.remove(index));
            if list.is_empty() {
                state.observers.remove(key);
            }
            removed
        };
        drop(removed);
    }
}

/// Downcasts a dynamic value to `V`, or reports a type mismatch for `key`
fn downcast_value<V: Any + Clone>(key: &str, value: &DynValue) -> EventResult<V> {
    value
        .downcast_ref::<V>()
        .cloned()
        .ok_or_else(|| EventError::TypeMismatch {
            key: key.to_string(),
            expected: type_name::<V>(),
        })
}

fn expect_value<V: Any + Clone>(key: &str, value: &DynValue) -> V {
    match downcast_value(key, value) {
        Ok(value) => value,
        Err(err) => panic!("{}", err),
    }
}

struct ObservationState<T> {
    observer_id: Option<Uuid>,
    retained_target: Option<Arc<T>>,
}

/// Observable view of one key of a [`KeyValueObservable`] object.
///
/// The underlying key observer is installed when the first handler is added
/// and removed once the last handler is gone. While observing, the target
/// is kept alive if `retain_target` was requested; otherwise it is only held
/// weakly.
///
/// # Panics
///
/// Reading or writing through [`Bindable`], and every change delivered while
/// observing, panics if the key's runtime type is not `V`. Use
/// [`try_value`](Self::try_value) / [`try_set_value`](Self::try_set_value)
/// to get the error instead.
pub struct DynamicProperty<T, V>
where
    T: KeyValueObservable,
    V: Any + Clone + Send + Sync,
{
    target: Weak<T>,
    key: String,
    retain_target: bool,
    me: Weak<Self>,
    /// Only touched while `handlers` is entered.
    observation: Mutex<ObservationState<T>>,
    handlers: HandlerTable<ValueChange<V>>,
    _value: PhantomData<fn() -> V>,
}

impl<T, V> fmt::Debug for DynamicProperty<T, V>
where
    T: KeyValueObservable,
    V: Any + Clone + Send + Sync,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DynamicProperty")
            .field("key", &self.key)
            .field("retain_target", &self.retain_target)
            .field("handlers", &self.handlers.len())
            .finish()
    }
}

impl<T, V> DynamicProperty<T, V>
where
    T: KeyValueObservable,
    V: Any + Clone + Send + Sync,
{
    /// Creates a dynamic property that retains its target while observing
    pub fn new(target: &Arc<T>, key: impl Into<String>) -> Arc<Self> {
        Self::with_retention(target, key, true)
    }

    /// Creates a dynamic property.
    ///
    /// # Arguments
    /// * `target` - The object owning the key
    /// * `key` - The key to observe
    /// * `retain_target` - Whether the target is kept alive while observing
    pub fn with_retention(target: &Arc<T>, key: impl Into<String>, retain_target: bool) -> Arc<Self> {
        let target = Arc::downgrade(target);
        let key = key.into();
        Arc::new_cyclic(|me| Self {
            target,
            key,
            retain_target,
            me: me.clone(),
            observation: Mutex::new(ObservationState {
                observer_id: None,
                retained_target: None,
            }),
            handlers: HandlerTable::new(),
            _value: PhantomData,
        })
    }

    /// The observed key
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Whether the key observer is currently installed
    pub fn is_observing(&self) -> bool {
        let _section = self.handlers.enter();
        self.observation.lock().observer_id.is_some()
    }

    /// Reads the key through to the target
    pub fn try_value(&self) -> EventResult<V> {
        let target = self.upgrade_target()?;
        let value = target.value_for_key(&self.key)?;
        downcast_value(&self.key, &value)
    }

    /// Writes the key through to the target
    pub fn try_set_value(&self, value: V) -> EventResult<()> {
        let target = self.upgrade_target()?;
        target.set_value_for_key(&self.key, Arc::new(value))
    }

    fn upgrade_target(&self) -> EventResult<Arc<T>> {
        self.target
            .upgrade()
            .ok_or(EventError::TargetDropped)
    }

    fn start_observation(&self) {
        let mut observation = self.observation.lock();
        if observation.observer_id.is_some() {
            return;
        }
        let Some(target) = self.target.upgrade() else {
            debug!("Target of '{}' is gone; not observing", self.key);
            return;
        };

        let me = self.me.clone();
        let observer: KeyObserver = Arc::new(move |key: &str, old_value: &DynValue, new_value: &DynValue| {
            if let Some(me) = me.upgrade() {
                let change = ValueChange::new(
                    expect_value::<V>(key, old_value),
                    expect_value::<V>(key, new_value),
                );
                me.publish(change);
            }
        });

        observation.observer_id = Some(target.add_key_observer(&self.key, observer));
        if self.retain_target {
            observation.retained_target = Some(target);
        }
        debug!("Started observing key '{}'", self.key);
    }

    fn stop_observation(&self) {
        let (observer_id, _released) = {
            let mut observation = self.observation.lock();
            (observation.observer_id.take(), observation.retained_target.take())
        };
        let Some(observer_id) = observer_id else {
            return;
        };
        if let Some(target) = self.target.upgrade() {
            target.remove_key_observer(&self.key, observer_id);
        }
        debug!("Stopped observing key '{}'", self.key);
    }
}

impl<T, V> EventPublisher for DynamicProperty<T, V>
where
    T: KeyValueObservable,
    V: Any + Clone + Send + Sync,
{
    type Event = ValueChange<V>;

    fn event_handlers(&self) -> &HandlerTable<ValueChange<V>> {
        &self.handlers
    }

    fn on_handler_added(&self) {
        self.start_observation();
    }

    fn on_handler_removed(&self) {
        if self.handlers.is_empty() {
            self.stop_observation();
        }
    }
}

impl<T, V> Bindable for DynamicProperty<T, V>
where
    T: KeyValueObservable,
    V: Any + Clone + Send + Sync,
{
    type Value = V;

    fn value(&self) -> V {
        match self.try_value() {
            Ok(value) => value,
            Err(err) => panic!("{}", err),
        }
    }

    fn set_value(&self, value: V) {
        if let Err(err) = self.try_set_value(value) {
            panic!("{}", err);
        }
    }
}

impl<T, V> Drop for DynamicProperty<T, V>
where
    T: KeyValueObservable,
    V: Any + Clone + Send + Sync,
{
    fn drop(&mut self) {
        let observer_id = self.observation.get_mut().observer_id.take();
        if let (Some(observer_id), Some(target)) = (observer_id, self.target.upgrade()) {
            target.remove_key_observer(&self.key, observer_id);
        }
    }
}
