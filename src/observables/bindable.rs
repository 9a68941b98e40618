use std::fmt;
use std::sync::{Arc, Weak};

use tracing::warn;

/// Types that expose a settable value.
///
/// Bindables are the receiving side of
/// [`ObservationManager::bind`](crate::observation::ObservationManager::bind).
/// Implementations use interior mutability so they can be shared across
/// threads behind an `Arc`.
pub trait Bindable: Send + Sync {
    /// The type of the value
    type Value;

    /// Returns the current value.
    ///
    /// # Panics
    ///
    /// Write-only bindables such as [`CustomBindable`] have nothing to read
    /// and panic. Calling this on them is a programming error.
    fn value(&self) -> Self::Value;

    /// Replaces the value
    fn set_value(&self, value: Self::Value);
}

/// Setter invoked by a [`CustomBindable`] with its target and the new value
pub type Setter<T, V> = Box<dyn Fn(&T, V) + Send + Sync + 'static>;

/// A write-only bindable that forwards every written value to a setter.
///
/// Wraps a plain field of some target object so it can receive bound
/// values. The target is held weakly; once it has been dropped, writes are
/// logged and skipped.
pub struct CustomBindable<T, V> {
    target: Weak<T>,
    setter: Setter<T, V>,
}

impl<T, V> fmt::Debug for CustomBindable<T, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CustomBindable")
            .field("target_alive", &(self.target.strong_count() > 0))
            .finish_non_exhaustive()
    }
}

impl<T, V> CustomBindable<T, V> {
    /// Creates a custom bindable.
    ///
    /// # Arguments
    /// * `target` - The object owning the wrapped field
    /// * `setter` - Invoked with the target and each new value
    pub fn new<F>(target: &Arc<T>, setter: F) -> Self
    where
        F: Fn(&T, V) + Send + Sync + 'static,
    {
        Self {
            target: Arc::downgrade(target),
            setter: Box::new(setter),
        }
    }

    /// The target, if it is still alive
    pub fn target(&self) -> Option<Arc<T>> {
        self.target.upgrade()
    }
}

impl<T, V> Bindable for CustomBindable<T, V>
where
    T: Send + Sync,
{
    type Value = V;

    fn value(&self) -> V {
        panic!("Retrieving a value from a custom bindable is not supported")
    }

    fn set_value(&self, value: V) {
        match self.target.upgrade() {
            Some(target) => (self.setter)(&target, value),
            None => warn!("Custom bindable target was dropped; skipping write"),
        }
    }
}
