//--------------------------------------------------------------------------------------------------
// MODULE OVERVIEW
//--------------------------------------------------------------------------------------------------
// Value holders and adapters that publish through the event core.
//
// | Component              | Description                                              |
// |------------------------|----------------------------------------------------------|
// | Property               | Observable value cell publishing ValueChange events      |
// | Bindable               | Capability: read/write a value                           |
// | CustomBindable         | Write-only bindable forwarding to a setter               |
// | DynamicProperty        | Typed observable over one key of a key-value object      |
// | PropertyBag            | In-memory key-value observable                           |
// | NotificationObservable | Publisher over one notification center route             |
//--------------------------------------------------------------------------------------------------

mod bindable;
mod dynamic;
mod notification;
mod property;

// Re-exports
pub use bindable::{Bindable, CustomBindable, Setter};
pub use dynamic::{DynValue, DynamicProperty, KeyObserver, KeyValueObservable, PropertyBag};
pub use notification::{
    Notification, NotificationCallback, NotificationCenter, NotificationName, NotificationObservable,
};
pub use property::Property;
