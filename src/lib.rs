// Expose the modules
pub mod config;
pub mod events;
pub mod observables;
pub mod observation;
pub mod scheduling;

// Re-export key types for easier usage
pub use config::{ConfigError, SchedulerConfig};
pub use events::{EventError, EventHandlerToken, EventPublisher, EventResult, HandlerTable, ValueChange};
pub use observables::{Bindable, CustomBindable, DynamicProperty, Property};
pub use observation::{Observation, ObservationManager, Observer};
pub use scheduling::{
    AffinityPump, AffinityScheduler, AffinityThread, EventScheduler, ImmediateScheduler, immediate,
};
