use std::fmt;

use uuid::Uuid;

/// Opaque key identifying one handler registration on an event publisher.
///
/// Every call to [`EventPublisher::add_event_handler`](super::EventPublisher::add_event_handler)
/// creates a fresh token; tokens are never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EventHandlerToken(Uuid);

impl EventHandlerToken {
    pub(crate) fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for EventHandlerToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
