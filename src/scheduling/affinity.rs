//--------------------------------------------------------------------------------------------------
// MODULE OVERVIEW
//--------------------------------------------------------------------------------------------------
// Thread-affinity delivery. Jobs scheduled from the designated thread run inline; jobs scheduled
// from any other thread are queued on a FIFO channel and run later on the designated thread.
//
// | Component           | Description                                                 |
// |---------------------|-------------------------------------------------------------|
// | AffinityScheduler   | Cloneable scheduler bound to one thread                     |
// | AffinityThread      | Spawned worker thread that drains the queue until shutdown  |
// | AffinityPump        | Queue drained manually by the thread that created it        |
// | Dispatch            | Messages sent to the designated thread                      |
//--------------------------------------------------------------------------------------------------

use std::fmt;
use std::marker::PhantomData;
use std::thread::{self, JoinHandle, ThreadId};
use std::time::Duration;

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender, TryRecvError, unbounded};
use tracing::{debug, info, warn};

use super::{EventScheduler, Job};
use crate::config::SchedulerConfig;
use crate::events::{EventError, EventResult};

/// Messages sent to the designated thread
enum Dispatch {
    /// Run a scheduled job
    Run(Job),
    /// Stop the worker loop of an [`AffinityThread`]
    Shutdown,
}

/// Scheduler that delivers every job on one designated thread.
///
/// Scheduling from the designated thread itself behaves like the immediate
/// scheduler, so nested same-thread publishes never deadlock or reorder.
/// Scheduling from any other thread enqueues the job and returns at once;
/// jobs enqueued from one thread run in the order they were enqueued.
#[derive(Clone)]
pub struct AffinityScheduler {
    thread_id: ThreadId,
    sender: Sender<Dispatch>,
}

impl fmt::Debug for AffinityScheduler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AffinityScheduler")
            .field("thread_id", &self.thread_id)
            .field("queued", &self.sender.len())
            .finish()
    }
}

impl AffinityScheduler {
    /// Designates the calling thread as the delivery thread.
    ///
    /// The returned pump must be drained by this same thread (for example
    /// from its event loop) for queued jobs to run.
    pub fn for_current_thread() -> (Self, AffinityPump) {
        let (sender, receiver) = unbounded();
        let scheduler = Self {
            thread_id: thread::current().id(),
            sender,
        };
        let pump = AffinityPump {
            receiver,
            _not_send: PhantomData,
        };
        (scheduler, pump)
    }

    /// The id of the designated thread
    pub fn thread_id(&self) -> ThreadId {
        self.thread_id
    }

    /// Whether the calling thread is the designated thread
    pub fn is_on_designated_thread(&self) -> bool {
        thread::current().id() == self.thread_id
    }

    /// Number of jobs waiting to be run on the designated thread
    pub fn pending(&self) -> usize {
        self.sender.len()
    }

    /// Schedules `job`, reporting whether it could be handed off.
    ///
    /// # Returns
    ///
    /// * `Ok(())` - The job ran inline or was queued.
    /// * `Err(EventError::SchedulerStopped)` - The designated thread no longer drains the queue.
    pub fn try_schedule(&self, job: Job) -> EventResult<()> {
        if self.is_on_designated_thread() {
            job();
            return Ok(());
        }

        self.sender
            .send(Dispatch::Run(job))
            .map_err(|_| EventError::SchedulerStopped)
    }
}

impl EventScheduler for AffinityScheduler {
    fn schedule(&self, job: Job) {
        if let Err(e) = self.try_schedule(job) {
            warn!("Dropping job for thread {:?}: {}", self.thread_id, e);
        }
    }
}

/// Queue of jobs for a thread designated with [`AffinityScheduler::for_current_thread`].
///
/// The pump is deliberately not `Send`: jobs must run on the thread that
/// created it.
pub struct AffinityPump {
    receiver: Receiver<Dispatch>,
    _not_send: PhantomData<*const ()>,
}

impl fmt::Debug for AffinityPump {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AffinityPump")
            .field("queued", &self.receiver.len())
            .finish()
    }
}

impl AffinityPump {
    /// Runs every job currently queued, returning how many ran.
    ///
    /// Jobs queued by the jobs themselves are run in the same call.
    pub fn run_pending(&self) -> usize {
        let mut ran = 0;
        loop {
            match self.receiver.try_recv() {
                Ok(Dispatch::Run(job)) => {
                    job();
                    ran += 1;
                }
                Ok(Dispatch::Shutdown) => {}
                Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => break,
            }
        }
        ran
    }

    /// Waits up to `timeout` for one job and runs it.
    ///
    /// # Returns
    ///
    /// `true` if a job ran, `false` on timeout or when every scheduler was dropped.
    pub fn run_next(&self, timeout: Duration) -> bool {
        match self.receiver.recv_timeout(timeout) {
            Ok(Dispatch::Run(job)) => {
                job();
                true
            }
            Ok(Dispatch::Shutdown) => false,
            Err(RecvTimeoutError::Timeout) | Err(RecvTimeoutError::Disconnected) => false,
        }
    }

    /// Number of queued jobs
    pub fn pending(&self) -> usize {
        self.receiver.len()
    }
}

/// Dedicated worker thread that runs every job scheduled on it.
///
/// The worker drains its queue in FIFO order until [`shutdown`](Self::shutdown)
/// is called or the handle is dropped. Jobs queued before the shutdown still
/// run; jobs scheduled afterwards are reported as undeliverable.
pub struct AffinityThread {
    name: String,
    scheduler: AffinityScheduler,
    handle: Option<JoinHandle<()>>,
}

impl fmt::Debug for AffinityThread {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AffinityThread")
            .field("name", &self.name)
            .field("scheduler", &self.scheduler)
            .field("running", &self.handle.is_some())
            .finish()
    }
}

impl AffinityThread {
    /// Spawns the worker thread described by `config`.
    ///
    /// # Arguments
    /// * `config` - Thread name and optional stack size
    ///
    /// # Returns
    /// The running thread, or `EventError::Spawn` if the OS refused to create it
    pub fn spawn(config: &SchedulerConfig) -> EventResult<Self> {
        let (sender, receiver) = unbounded();

        let mut builder = thread::Builder::new().name(config.thread_name.clone());
        if let Some(stack_size) = config.stack_size {
            builder = builder.stack_size(stack_size);
        }

        let name = config.thread_name.clone();
        let handle = builder
            .spawn(move || Self::run(&name, receiver))
            .map_err(|e| EventError::Spawn(e.to_string()))?;

        let scheduler = AffinityScheduler {
            thread_id: handle.thread().id(),
            sender,
        };

        Ok(Self {
            name: config.thread_name.clone(),
            scheduler,
            handle: Some(handle),
        })
    }

    /// Main worker loop
    fn run(name: &str, receiver: Receiver<Dispatch>) {
        info!("Affinity thread '{}' started", name);

        while let Ok(dispatch) = receiver.recv() {
            match dispatch {
                Dispatch::Run(job) => job(),
                Dispatch::Shutdown => break,
            }
        }

        info!("Affinity thread '{}' stopped", name);
    }

    /// Returns a scheduler delivering on this thread
    pub fn scheduler(&self) -> AffinityScheduler {
        self.scheduler.clone()
    }

    /// Name of the worker thread
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Stops the worker after it has run every job queued so far
    pub fn shutdown(mut self) {
        self.stop();
    }

    fn stop(&mut self) {
        let Some(handle) = self.handle.take() else {
            return;
        };

        debug!("Shutting down affinity thread '{}'", self.name);
        let _ = self.scheduler.sender.send(Dispatch::Shutdown);

        // A job running on the worker may drop the last handle; it cannot join itself.
        if handle.thread().id() != thread::current().id() {
            let _ = handle.join();
        }
    }
}

impl Drop for AffinityThread {
    fn drop(&mut self) {
        self.stop();
    }
}
