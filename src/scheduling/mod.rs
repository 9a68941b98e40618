//--------------------------------------------------------------------------------------------------
// MODULE OVERVIEW
//--------------------------------------------------------------------------------------------------
// Delivery policies for published events. A publisher never calls a handler directly; it hands
// the call to the scheduler the handler was registered with.
//
// | Component           | Description                                                 |
// |---------------------|-------------------------------------------------------------|
// | EventScheduler      | Capability: run a job according to some delivery policy     |
// | ImmediateScheduler  | Runs the job synchronously on the calling thread            |
// | AffinityScheduler   | Runs the job on one designated thread                       |
// | AffinityThread      | Dedicated worker thread draining an affinity queue          |
// | AffinityPump        | Drains an affinity queue on the thread that created it      |
//--------------------------------------------------------------------------------------------------

pub mod affinity;

use std::sync::{Arc, LazyLock};

pub use affinity::{AffinityPump, AffinityScheduler, AffinityThread};

/// A unit of deferred work handed to a scheduler
pub type Job = Box<dyn FnOnce() + Send + 'static>;

/// Strategy deciding when and on which thread a handler invocation runs.
pub trait EventScheduler: Send + Sync {
    /// Runs `job` according to this scheduler's delivery policy
    fn schedule(&self, job: Job);
}

/// Scheduler that invokes each job synchronously on the calling thread,
/// before `schedule` returns. This is the default for every registration.
#[derive(Debug, Clone, Copy, Default)]
pub struct ImmediateScheduler;

impl EventScheduler for ImmediateScheduler {
    fn schedule(&self, job: Job) {
        job()
    }
}

static IMMEDIATE: LazyLock<Arc<dyn EventScheduler>> = LazyLock::new(|| Arc::new(ImmediateScheduler));

/// Returns the shared immediate scheduler
pub fn immediate() -> Arc<dyn EventScheduler> {
    Arc::clone(&IMMEDIATE)
}
