use std::sync::Arc;

use super::manager::ObservationManager;
use super::observation::Observation;
use crate::events::EventPublisher;
use crate::observables::Bindable;
use crate::scheduling::EventScheduler;

/// Types that own an [`ObservationManager`].
///
/// Implementors embed a manager and expose it; every other method forwards
/// to it. The observations live exactly as long as the implementor.
///
/// ```
/// use std::sync::Arc;
/// use bindery::observables::Property;
/// use bindery::observation::{ObservationManager, Observer};
///
/// struct Label {
///     observations: ObservationManager,
/// }
///
/// impl Observer for Label {
///     fn observation_manager(&self) -> &ObservationManager {
///         &self.observations
///     }
/// }
///
/// let title = Arc::new(Property::new("Untitled".to_string()));
/// let text = Arc::new(Property::new(String::new()));
/// let label = Label { observations: ObservationManager::new() };
///
/// label.bind(&title, &text);
/// assert_eq!(text.get(), "Untitled");
/// ```
pub trait Observer {
    /// The manager tracking this observer's observations
    fn observation_manager(&self) -> &ObservationManager;

    /// See [`ObservationManager::observe`]
    fn observe<P, F>(&self, producer: &Arc<P>, handler: F) -> Observation
    where
        P: EventPublisher,
        F: Fn(&P::Event) + Send + Sync + 'static,
    {
        self.observation_manager().observe(producer, handler)
    }

    /// See [`ObservationManager::observe_on`]
    fn observe_on<P, F>(
        &self,
        producer: &Arc<P>,
        scheduler: Arc<dyn EventScheduler>,
        handler: F,
    ) -> Observation
    where
        P: EventPublisher,
        F: Fn(&P::Event) + Send + Sync + 'static,
    {
        self.observation_manager()
            .observe_on(producer, scheduler, handler)
    }

    /// See [`ObservationManager::bind`]
    fn bind<P, B>(&self, producer: &Arc<P>, target: &Arc<B>) -> Observation
    where
        P: EventPublisher + Bindable,
        P::Value: 'static,
        B: Bindable<Value = P::Value> + 'static,
    {
        self.observation_manager().bind(producer, target)
    }

    /// See [`ObservationManager::bind_on`]
    fn bind_on<P, B>(
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
        self.observation_manager()
            .bind_on(producer, scheduler, target)
    }

    /// See [`ObservationManager::bind_to`]
    fn bind_to<P, T, F>(&self, producer: &Arc<P>, target: &Arc<T>, setter: F) -> Observation
    where
        P: EventPublisher + Bindable,
        P::Value: 'static,
        T: Send + Sync + 'static,
        F: Fn(&T, P::Value) + Send + Sync + 'static,
    {
        self.observation_manager().bind_to(producer, target, setter)
    }

    /// See [`ObservationManager::bind_to_on`]
    fn bind_to_on<P, T, F>(
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
        self.observation_manager()
            .bind_to_on(producer, scheduler, target, setter)
    }

    /// See [`ObservationManager::unobserve`]
    fn unobserve(&self, observation: &Observation) {
        self.observation_manager().unobserve(observation)
    }

    /// See [`ObservationManager::unobserve_all`]
    fn unobserve_all(&self) {
        self.observation_manager().unobserve_all()
    }
}
