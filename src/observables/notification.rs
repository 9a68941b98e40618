//--------------------------------------------------------------------------------------------------
// MODULE OVERVIEW
//--------------------------------------------------------------------------------------------------
// In-process notification routing and its EventPublisher adapter.
//
// | Component              | Description                                              |
// |------------------------|----------------------------------------------------------|
// | Notification           | Named payload posted by an optional sender               |
// | NotificationCenter     | Routes notifications by (name, optional sender)          |
// | NotificationObservable | EventPublisher over one (name, sender) route             |
//--------------------------------------------------------------------------------------------------

use std::fmt;
use std::sync::{Arc, Weak};

use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use tracing::{debug, trace};
use uuid::Uuid;

use crate::events::{EventPublisher, HandlerTable};

/// Name of a notification
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NotificationName(String);

impl NotificationName {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for NotificationName {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

impl fmt::Display for NotificationName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A posted notification
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notification {
    /// The name observers subscribe to
    pub name: NotificationName,
    /// Identity of the posting object, if any
    pub sender: Option<Uuid>,
    /// Arbitrary payload
    pub user_info: Option<serde_json::Value>,
}

impl Notification {
    /// Creates a notification without sender or payload
    pub fn new(name: impl Into<NotificationName>) -> Self {
        Self {
            name: name.into(),
            sender: None,
            user_info: None,
        }
    }

    /// Sets the sender
    pub fn with_sender(mut self, sender: Uuid) -> Self {
        self.sender = Some(sender);
        self
    }

    /// Sets the payload
    pub fn with_user_info(mut self, user_info: serde_json::Value) -> Self {
        self.user_info = Some(user_info);
        self
    }
}

/// Callback receiving routed notifications
pub type NotificationCallback = Arc<dyn Fn(&Notification) + Send + Sync + 'static>;

struct Route {
    id: Uuid,
    name: NotificationName,
    sender: Option<Uuid>,
    callback: NotificationCallback,
}

impl Route {
    fn matches(&self, notification: &Notification) -> bool {
        self.name == notification.name
            && self.sender.is_none_or(|sender| notification.sender == Some(sender))
    }
}

/// Routes posted notifications to observers registered for their name.
///
/// An observer registered with a sender only receives notifications posted
/// by that sender; one registered without a sender receives all of them.
#[derive(Default)]
pub struct NotificationCenter {
    routes: RwLock<Vec<Route>>,
}

impl fmt::Debug for NotificationCenter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NotificationCenter")
            .field("observers", &self.observer_count())
            .finish()
    }
}

impl NotificationCenter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `callback` for notifications named `name`.
    ///
    /// # Returns
    /// An id usable with [`remove_observer`](Self::remove_observer).
    pub fn add_observer<F>(&self, name: NotificationName, sender: Option<Uuid>, callback: F) -> Uuid
    where
        F: Fn(&Notification) + Send + Sync + 'static,
    {
        let id = Uuid::new_v4();
        debug!("Observing notification '{}' (sender: {:?})", name, sender);
        self.routes.write().push(Route {
            id,
            name,
            sender,
            callback: Arc::new(callback),
        });
        id
    }

    /// Unregisters an observer; returns whether it was registered
    pub fn remove_observer(&self, id: Uuid) -> bool {
        // The route is dropped after the lock is released.
        let removed = {
            let mut routes = self.routes.write();
            routes
                .iter()
                .position(|route| route.id == id)
                .map(|index| routes.remove(index))
        };
        removed.is_some()
    }

    /// Delivers `notification` to every matching observer on the calling thread.
    ///
    /// # Returns
    /// The number of observers that received it.
    pub fn post(&self, notification: Notification) -> usize {
        // Callbacks run outside the lock so they may add or remove observers.
        let callbacks: Vec<NotificationCallback> = {
            let routes = self.routes.read();
            routes
                .iter()
                .filter(|route| route.matches(&notification))
                .map(|route| Arc::clone(&route.callback))
                .collect()
        };

        trace!(
            "Posting notification '{}' to {} observer(s)",
            notification.name,
            callbacks.len()
        );

        for callback in &callbacks {
            callback(&notification);
        }
        callbacks.len()
    }

    /// Number of registered observers
    pub fn observer_count(&self) -> usize {
        self.routes.read().len()
    }
}

/// Publishes every notification routed to `(name, sender)` by a center.
///
/// Registers with the center only while at least one handler is present.
pub struct NotificationObservable {
    center: Arc<NotificationCenter>,
    name: NotificationName,
    sender: Option<Uuid>,
    me: Weak<Self>,
    /// Only touched while `handlers` is entered.
    observer_id: Mutex<Option<Uuid>>,
    handlers: HandlerTable<Notification>,
}

impl fmt::Debug for NotificationObservable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NotificationObservable")
            .field("name", &self.name)
            .field("sender", &self.sender)
            .field("handlers", &self.handlers.len())
            .finish()
    }
}

impl NotificationObservable {
    /// Creates an observable for notifications named `name`.
    ///
    /// # Arguments
    /// * `center` - The center to register with
    /// * `name` - The notification name
    /// * `sender` - Restrict to notifications from this sender, or `None` for any sender
    pub fn new(
        center: &Arc<NotificationCenter>,
        name: impl Into<NotificationName>,
        sender: Option<Uuid>,
    ) -> Arc<Self> {
        let center = Arc::clone(center);
        let name = name.into();
        Arc::new_cyclic(|me| Self {
            center,
            name,
            sender,
            me: me.clone(),
            observer_id: Mutex::new(None),
            handlers: HandlerTable::new(),
        })
    }

    /// The observed notification name
    pub fn name(&self) -> &NotificationName {
        &self.name
    }

    /// Whether the observable is registered with its center
    pub fn is_observing(&self) -> bool {
        let _section = self.handlers.enter();
        self.observer_id.lock().is_some()
    }

    fn start_observation(&self) {
        let mut observer_id = self.observer_id.lock();
        if observer_id.is_some() {
            return;
        }

        let me = self.me.clone();
        *observer_id = Some(self.center.add_observer(
            self.name.clone(),
            self.sender,
            move |notification: &Notification| {
                if let Some(me) = me.upgrade() {
                    me.publish(notification.clone());
                }
            },
        ));
    }

    fn stop_observation(&self) {
        if let Some(id) = self.observer_id.lock().take() {
            self.center.remove_observer(id);
        }
    }
}

impl EventPublisher for NotificationObservable {
    type Event = Notification;

    fn event_handlers(&self) -> &HandlerTable<Notification> {
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

impl Drop for NotificationObservable {
    fn drop(&mut self) {
        if let Some(id) = self.observer_id.get_mut().take() {
            self.center.remove_observer(id);
        }
    }
}
