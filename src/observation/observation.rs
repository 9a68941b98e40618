use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use uuid::Uuid;

use crate::events::{EventHandlerToken, EventPublisher};

type Undo = Arc<dyn Fn() + Send + Sync + 'static>;

/// Handle to one live subscription or binding.
///
/// Holds the producer strongly, so the producer stays alive for as long as
/// the observation is tracked by its manager. Equality is by identity of
/// creation; clones compare equal to the original.
#[derive(Clone)]
pub struct Observation {
    id: Uuid,
    token: EventHandlerToken,
    undo: Undo,
}

impl Observation {
    /// Wraps the registration of `token` on `producer`
    pub(crate) fn new<P: EventPublisher>(producer: Arc<P>, token: EventHandlerToken) -> Self {
        Self {
            id: Uuid::new_v4(),
            token,
            undo: Arc::new(move || producer.remove_event_handler(token)),
        }
    }

    /// Unique id of this observation
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Token of the handler installed on the producer
    pub fn token(&self) -> EventHandlerToken {
        self.token
    }

    /// Removes the handler from its producer
    pub(crate) fn undo(&self) {
        (self.undo)()
    }
}

impl fmt::Debug for Observation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Observation")
            .field("id", &self.id)
            .field("token", &self.token)
            .finish()
    }
}

impl PartialEq for Observation {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Observation {}

impl Hash for Observation {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}
