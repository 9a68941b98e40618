//--------------------------------------------------------------------------------------------------
// MODULE OVERVIEW
//--------------------------------------------------------------------------------------------------
// Revocable subscriptions and one-way bindings, grouped by owner.
//
// | Component            | Description                                                |
// |----------------------|------------------------------------------------------------|
// | Observation          | Handle to one live subscription or binding                 |
// | ObservationManager   | Tracks observations and tears them down together           |
// | Observer             | Capability: owns an ObservationManager                     |
//--------------------------------------------------------------------------------------------------

mod manager;
mod observation;
mod observer;

// Re-exports
pub use manager::ObservationManager;
pub use observation::Observation;
pub use observer::Observer;
