//--------------------------------------------------------------------------------------------------
// STRUCTS & TRAITS
//--------------------------------------------------------------------------------------------------
// | Name                    | Description                                       | Key Methods       |
// |-------------------------|---------------------------------------------------|-------------------|
// | EventPublisher          | Capability: hold handlers and fan events out       | add_event_handler |
// |                         |                                                   | remove_event_...  |
// |                         |                                                   | publish           |
// | HandlerTable            | Token -> (handler, scheduler) map behind a        | enter, insert     |
// |                         | re-entrant lock                                   | remove, dispatch  |
// | PublisherGuard          | Held critical section of one handler table        |                   |
//--------------------------------------------------------------------------------------------------

use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use parking_lot::{ReentrantMutex, ReentrantMutexGuard};
use tracing::{debug, trace};

use super::token::EventHandlerToken;
use crate::scheduling::{self, EventScheduler};

/// A callback invoked with one published event
pub type EventHandler<E> = Arc<dyn Fn(&E) + Send + Sync + 'static>;

/// One registered handler and the scheduler that delivers to it
struct Registration<E> {
    handler: EventHandler<E>,
    scheduler: Arc<dyn EventScheduler>,
}

// Manual Clone: only the Arcs are cloned, `E` need not be Clone.
impl<E> Clone for Registration<E> {
    fn clone(&self) -> Self {
        Self {
            handler: Arc::clone(&self.handler),
            scheduler: Arc::clone(&self.scheduler),
        }
    }
}

type Registrations<E> = HashMap<EventHandlerToken, Registration<E>>;

/// Handler storage for one publisher instance.
///
/// Every mutation and every dispatch happens while holding one re-entrant
/// lock, so handlers invoked synchronously may call back into the same
/// publisher from the same thread. Implementors that carry their own state
/// (a current value, an observation flag) keep it consistent with the table
/// by doing their work inside [`enter`](Self::enter).
pub struct HandlerTable<E> {
    inner: ReentrantMutex<RefCell<Registrations<E>>>,
}

/// The held critical section of a [`HandlerTable`].
///
/// Released on drop. The same thread may enter again while holding it.
#[must_use = "the critical section ends as soon as the guard is dropped"]
pub struct PublisherGuard<'a, E> {
    _guard: ReentrantMutexGuard<'a, RefCell<Registrations<E>>>,
}

impl<E> Default for HandlerTable<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E> fmt::Debug for HandlerTable<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let guard = self.inner.lock();
        let mut out = f.debug_struct("HandlerTable");
        match guard.try_borrow() {
            Ok(registrations) => out.field("handlers", &registrations.len()),
            Err(_) => out.field("handlers", &"<busy>"),
        };
        out.finish()
    }
}

impl<E> HandlerTable<E> {
    /// Creates an empty table
    pub fn new() -> Self {
        Self {
            inner: ReentrantMutex::new(RefCell::new(HashMap::new())),
        }
    }

    /// Enters the table's critical section.
    pub fn enter(&self) -> PublisherGuard<'_, E> {
        PublisherGuard {
            _guard: self.inner.lock(),
        }
    }

    /// Inserts a registration under a fresh token
    pub fn insert(
        &self,
        handler: EventHandler<E>,
        scheduler: Arc<dyn EventScheduler>,
    ) -> EventHandlerToken {
        let guard = self.inner.lock();
        let token = EventHandlerToken::new();
        let total = {
            let mut registrations = guard.borrow_mut();
            registrations.insert(token, Registration { handler, scheduler });
            registrations.len()
        };
        debug!("Added event handler {} (total: {})", token, total);
        token
    }

    /// Removes the registration for `token`.
    ///
    /// # Returns
    /// `true` if the token was registered. Unknown tokens are a no-op.
    pub fn remove(&self, token: EventHandlerToken) -> bool {
        let guard = self.inner.lock();
        // The registration is dropped after the borrow ends: dropping a handler
        // may release state that calls back into this table.
        let (registration, total) = {
            let mut registrations = guard.borrow_mut();
            let registration = registrations.remove(&token);
            (registration, registrations.len())
        };
        let removed = registration.is_some();
        drop(registration);
        if removed {
            debug!("Removed event handler {} (total: {})", token, total);
        } else {
            trace!("Event handler {} was not registered", token);
        }
        removed
    }

    /// Whether `token` is currently registered
    pub fn contains(&self, token: EventHandlerToken) -> bool {
        self.inner.lock().borrow().contains_key(&token)
    }

    /// Number of registered handlers
    pub fn len(&self) -> usize {
        self.inner.lock().borrow().len()
    }

    /// Whether no handler is registered
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<E: Clone + Send + 'static> HandlerTable<E> {
    /// Hands `event` to every registered handler through its scheduler.
    ///
    /// The registrations are snapshotted before dispatch, so handlers added
    /// by a nested call do not receive this event and handlers removed by a
    /// nested call may still receive it. The lock stays held for the whole
    /// fan-out.
    ///
    /// # Returns
    /// The number of handlers the event was scheduled for.
    pub fn dispatch(&self, event: E) -> usize {
        let guard = self.inner.lock();
        let registrations: Vec<Registration<E>> = guard.borrow().values().cloned().collect();

        trace!("Publishing event to {} handler(s)", registrations.len());

        let count = registrations.len();
        for Registration { handler, scheduler } in registrations {
            let event = event.clone();
            scheduler.schedule(Box::new(move || handler(&event)));
        }
        count
    }
}

/// Types that hold a table of handlers and publish events to them.
///
/// Implementors only provide [`event_handlers`](Self::event_handlers); the
/// lifecycle hooks default to no-ops and exist for adapters that must start
/// or stop an underlying observation when handlers come and go.
pub trait EventPublisher: Send + Sync + 'static {
    /// The type of event this publisher publishes
    type Event: Clone + Send + 'static;

    /// The handler table of this publisher instance
    fn event_handlers(&self) -> &HandlerTable<Self::Event>;

    /// Adds a handler delivered by the immediate scheduler.
    ///
    /// # Returns
    /// A token usable to remove the handler later on.
    fn add_event_handler<F>(&self, handler: F) -> EventHandlerToken
    where
        F: Fn(&Self::Event) + Send + Sync + 'static,
        Self: Sized,
    {
        self.add_scheduled_event_handler(scheduling::immediate(), handler)
    }

    /// Adds a handler delivered by `scheduler`.
    ///
    /// # Arguments
    /// * `scheduler` - Decides when and on which thread `handler` runs
    /// * `handler` - Invoked with every event published after this call
    ///
    /// # Returns
    /// A token usable to remove the handler later on.
    fn add_scheduled_event_handler<F>(
        &self,
        scheduler: Arc<dyn EventScheduler>,
        handler: F,
    ) -> EventHandlerToken
    where
        F: Fn(&Self::Event) + Send + Sync + 'static,
        Self: Sized,
    {
        let table = self.event_handlers();
        let _section = table.enter();
        let token = table.insert(Arc::new(handler), scheduler);
        self.on_handler_added();
        token
    }

    /// Invoked, inside the critical section, after a handler was added
    fn on_handler_added(&self) {}

    /// Removes the handler registered under `token`.
    ///
    /// Removing an unknown or already removed token is a silent no-op.
    /// Invocations already handed to a queueing scheduler still run.
    fn remove_event_handler(&self, token: EventHandlerToken) {
        let table = self.event_handlers();
        let _section = table.enter();
        table.remove(token);
        self.on_handler_removed();
    }

    /// Invoked, inside the critical section, after a removal attempt
    fn on_handler_removed(&self) {}

    /// Publishes `event` to every registered handler
    fn publish(&self, event: Self::Event) {
        self.event_handlers().dispatch(event);
    }

    /// Number of registered handlers
    fn handler_count(&self) -> usize {
        self.event_handlers().len()
    }
}
