//--------------------------------------------------------------------------------------------------
// STRUCTS & ENUMS
//--------------------------------------------------------------------------------------------------
// | Name                    | Description                                       | Key Methods       |
// |-------------------------|---------------------------------------------------|-------------------|
// | ValueChange             | Old/new value pair published on every write       | new, is_change    |
// | EventError              | Error types for the event system                  | error, from       |
//--------------------------------------------------------------------------------------------------

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors that can occur in the event system
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EventError {
    /// A dynamically typed value did not have the expected runtime type
    #[error("Value for key '{key}' is not of type {expected}")]
    TypeMismatch {
        key: String,
        expected: &'static str,
    },

    /// The key is not declared on the observed object
    #[error("Unknown key: {0}")]
    UnknownKey(String),

    /// The observed object has been dropped
    #[error("Observed object is no longer alive")]
    TargetDropped,

    /// The designated thread of an affinity scheduler is no longer running
    #[error("Scheduler thread has stopped; job was not delivered")]
    SchedulerStopped,

    /// Failed to spawn a scheduler thread
    #[error("Failed to spawn scheduler thread: {0}")]
    Spawn(String),
}

/// Type alias for Result with EventError
pub type EventResult<T> = Result<T, EventError>;

/// Event published by value holders on every non-silent write.
///
/// `old_value` is the value immediately before the write and `new_value`
/// the value immediately after it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ValueChange<V> {
    /// Value before the write
    pub old_value: V,
    /// Value after the write
    pub new_value: V,
}

impl<V> ValueChange<V> {
    /// Creates a new value change event
    pub fn new(old_value: V, new_value: V) -> Self {
        Self {
            old_value,
            new_value,
        }
    }

    /// Consumes the event, returning `(old_value, new_value)`
    pub fn into_pair(self) -> (V, V) {
        (self.old_value, self.new_value)
    }
}

impl<V: PartialEq> ValueChange<V> {
    /// Whether the write actually changed the value.
    ///
    /// Writes of an equal value are still published; this lets handlers
    /// filter them out if they care.
    pub fn is_change(&self) -> bool {
        self.old_value != self.new_value
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_value_change_pair() {
        let change = ValueChange::new("A".to_string(), "B".to_string());
        assert!(change.is_change());
        assert_eq!(change.into_pair(), ("A".to_string(), "B".to_string()));
    }

    #[test]
    fn test_equal_write_is_not_a_change() {
        assert!(!ValueChange::new(3, 3).is_change());
    }

    #[test]
    fn test_value_change_serializes_with_field_names() {
        let json = serde_json::to_value(ValueChange::new(1, 2)).unwrap();
        assert_eq!(json, serde_json::json!({ "old_value": 1, "new_value": 2 }));
    }

    #[test]
    fn test_error_messages() {
        let err = EventError::TypeMismatch {
            key: "title".into(),
            expected: "alloc::string::String",
        };
        assert_eq!(
            err.to_string(),
            "Value for key 'title' is not of type alloc::string::String"
        );
        assert_eq!(EventError::UnknownKey("x".into()).to_string(), "Unknown key: x");
    }
}
