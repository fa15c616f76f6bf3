//! Event system for the Orbit runtime
//!
//! The event system provides:
//! - Delegated listeners multiplexed over one native subscription per
//!   (publisher, event, phase)
//! - Direct subscribers attaching one listener to a single node for a fixed
//!   set of events
//! - A tagged listener type accepting closures or handler objects

pub mod delegation;
pub mod listener;
pub mod subscriber;
pub mod tracker;

pub use delegation::{DelegateSubscription, EventManager};
pub use listener::{DelegateListener, EventHandler, ListenerFn};
pub use subscriber::EventSubscriber;
pub use tracker::{ListenerTracker, LookupRecord};

/// A registration that can be revoked
pub trait Disposable {
    /// Revoke the registration. Calling this more than once has no further
    /// effect.
    fn dispose(&self);
}
