//--------------------------------------------------------------------------------------------------
// MODULE OVERVIEW
//--------------------------------------------------------------------------------------------------
// Generic publish/subscribe core. A publisher owns a handler table guarded by one re-entrant lock
// and fans every published event out to its handlers through their schedulers.
//
// | Component            | Description                                                |
// |----------------------|------------------------------------------------------------|
// | EventHandlerToken    | Unique key for one handler registration                    |
// | EventPublisher       | Capability for add/remove/publish                          |
// | HandlerTable         | Lock-guarded token -> (handler, scheduler) map             |
// | ValueChange          | Old/new value event published by value holders             |
// | EventError           | Error types for the event system                           |
//--------------------------------------------------------------------------------------------------

mod publisher;
mod token;
mod types;

// Re-exports
pub use publisher::{EventHandler, EventPublisher, HandlerTable, PublisherGuard};
pub use token::EventHandlerToken;
pub use types::{EventError, EventResult, ValueChange};
