//--------------------------------------------------------------------------------------------------
// STRUCTS
//--------------------------------------------------------------------------------------------------
// | Name                    | Description                                       | Key Methods       |
// |-------------------------|---------------------------------------------------|-------------------|
// | ObservationManager      | Tracks the observations of one owner and tears    | observe, bind     |
// |                         | them down as a group                              | unobserve_all     |
//--------------------------------------------------------------------------------------------------

use std::cell::RefCell;
use std::fmt;
use std::sync::Arc;

use parking_lot::ReentrantMutex;
use tracing::{debug, trace};

use super::observation::Observation;
use crate::events::EventPublisher;
use crate::observables::{Bindable, CustomBindable};
use crate::scheduling::{self, EventScheduler};

/// Receives each value a binding propagates
type Sink<V> = Arc<dyn Fn(V) + Send + Sync + 'static>;

/// Aggregates the subscriptions and one-way bindings made by one owner.
///
/// Every tracked observation keeps its producer alive. Dropping the manager
/// removes every handler it installed.
pub struct ObservationManager {
    observations: ReentrantMutex<RefCell<Vec<Observation>>>,
}

impl Default for ObservationManager {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for ObservationManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ObservationManager")
            .field("observations", &self.len())
            .finish()
    }
}

impl ObservationManager {
    /// Creates a manager tracking nothing
    pub fn new() -> Self {
        Self {
            observations: ReentrantMutex::new(RefCell::new(Vec::new())),
        }
    }

    /// Observes `producer` with a handler delivered by the immediate scheduler
    pub fn observe<P, F>(&self, producer: &Arc<P>, handler: F) -> Observation
    where
        P: EventPublisher,
        F: Fn(&P::Event) + Send + Sync + 'static,
    {
        self.observe_on(producer, scheduling::immediate(), handler)
    }

    /// Observes `producer` with a handler delivered by `scheduler`.
    ///
    /// # Arguments
    /// * `producer` - The publisher to observe; kept alive by the returned observation
    /// * `scheduler` - Decides when and where `handler` runs
    /// * `handler` - Invoked with every event published after this call
    ///
    /// # Returns
    /// The observation, which can be passed to [`unobserve`](Self::unobserve).
    pub fn observe_on<P, F>(
        &self,
        producer: &Arc<P>,
        scheduler: Arc<dyn EventScheduler>,
        handler: F,
    ) -> Observation
    where
        P: EventPublisher,
        F: Fn(&P::Event) + Send + Sync + 'static,
    {
        // The handler is installed before the observation is recorded, both
        // under the manager lock, so `unobserve_all` never sees half of it.
        let guard = self.observations.lock();
        let token = producer.add_scheduled_event_handler(scheduler, handler);
        let observation = Observation::new(Arc::clone(producer), token);
        let total = {
            let mut observations = guard.borrow_mut();
            observations.push(observation.clone());
            observations.len()
        };
        debug!("Added observation {} (total: {})", observation.id(), total);
        observation
    }

    /// Binds `target` to `producer` with the immediate scheduler.
    ///
    /// `target` holds the producer's value when this returns.
    pub fn bind<P, B>(&self, producer: &Arc<P>, target: &Arc<B>) -> Observation
    where
        P: EventPublisher + Bindable,
        P::Value: 'static,
        B: Bindable<Value = P::Value> + 'static,
    {
        self.bind_on(producer, scheduling::immediate(), target)
    }

    /// Keeps `target` in sync with `producer`, one way.
    ///
    /// The initial assignment and every later one run through `scheduler`.
    /// Writes to `target` never flow back to `producer`. `target` is held
    /// weakly; once it is gone the binding does nothing.
    pub fn bind_on<P, B>(
        &self,
        producer: &Arc<P>,
        scheduler: Arc<dyn EventScheduler>,
        target: &Arc<B>,
    ) -> Observation
    where
        P: EventPublisher + Bindable,
        P::Value: 'static,
        B: Bindable<Value = P::Value> + 'static,
    {
        let target = Arc::downgrade(target);
        let sink: Sink<P::Value> = Arc::new(move |value: P::Value| match target.upgrade() {
            Some(target) => target.set_value(value),
            None => trace!("Bound target was dropped; skipping write"),
        });
        self.bind_sink(producer, scheduler, sink)
    }

    /// Binds a field of `target` to `producer` through `setter`.
    ///
    /// The setter is wrapped in a [`CustomBindable`], so `target` is only held
    /// weakly.
    pub fn bind_to<P, T, F>(&self, producer: &Arc<P>, target: &Arc<T>, setter: F) -> Observation
    where
        P: EventPublisher + Bindable,
        P::Value: 'static,
        T: Send + Sync + 'static,
        F: Fn(&T, P::Value) + Send + Sync + 'static,
    {
        self.bind_to_on(producer, scheduling::immediate(), target, setter)
    }

    /// Binds a field of `target` to `producer` through `setter`, delivered by `scheduler`.
    ///
    /// # Arguments
    /// * `producer` - The value to follow
    /// * `scheduler` - Decides when and where `setter` runs
    /// * `target` - The object owning the field; held weakly
    /// * `setter` - Invoked with the target and each value
    pub fn bind_to_on<P, T, F>(
        &self,
        producer: &Arc<P>,
        scheduler: Arc<dyn EventScheduler>,
        target: &Arc<T>,
        setter: F,
    ) -> Observation
    where
        P: EventPublisher + Bindable,
        P::Value: 'static,
        T: Send + Sync + 'static,
        F: Fn(&T, P::Value) + Send + Sync + 'static,
    {
        let bindable = CustomBindable::new(target, setter);
        let sink: Sink<P::Value> = Arc::new(move |value: P::Value| bindable.set_value(value));
        self.bind_sink(producer, scheduler, sink)
    }

    fn bind_sink<P>(
        &self,
        producer: &Arc<P>,
        scheduler: Arc<dyn EventScheduler>,
        sink: Sink<P::Value>,
    ) -> Observation
    where
        P: EventPublisher + Bindable,
        P::Value: 'static,
    {
        let weak = Arc::downgrade(producer);
        let initial = Arc::clone(&sink);
        scheduler.schedule(Box::new(move || {
            if let Some(producer) = weak.upgrade() {
                initial(producer.value());
            }
        }));

        let weak = Arc::downgrade(producer);
        self.observe_on(producer, scheduler, move |_: &P::Event| {
            if let Some(producer) = weak.upgrade() {
                sink(producer.value());
            }
        })
    }

    /// Stops tracking `observation` and removes its handler.
    ///
    /// Unknown or already removed observations are ignored.
    pub fn unobserve(&self, observation: &Observation) {
        let removed = {
            let guard = self.observations.lock();
            let mut observations = guard.borrow_mut();
            observations
                .iter()
                .position(|tracked| tracked == observation)
                .map(|index| observations.remove(index))
        };

        match removed {
            Some(removed) => {
                removed.undo();
                debug!("Removed observation {}", removed.id());
            }
            None => trace!("Observation {} was not tracked", observation.id()),
        }
    }

    /// Stops tracking every observation and removes all their handlers
    pub fn unobserve_all(&self) {
        let observations = {
            let guard = self.observations.lock();
            std::mem::take(&mut *guard.borrow_mut())
        };
        if observations.is_empty() {
            return;
        }

        debug!("Removing {} observation(s)", observations.len());
        for observation in &observations {
            observation.undo();
        }
    }

    /// Number of tracked observations
    pub fn len(&self) -> usize {
        self.observations.lock().borrow().len()
    }

    /// Whether nothing is tracked
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Drop for ObservationManager {
    fn drop(&mut self) {
        self.unobserve_all();
    }
}
