//! Listener shapes accepted by delegated and direct subscriptions

use std::fmt;
use std::rc::Rc;

use crate::dom::{Event, NativeListener};

/// An object that handles events through a method instead of a closure
pub trait EventHandler {
    /// Handle an event
    fn handle_event(&self, event: &Event) -> anyhow::Result<()>;
}

/// Type alias for a closure listener
pub type ListenerFn = Rc<dyn Fn(&Event) -> anyhow::Result<()>>;

/// A listener registered for one target, resolved once at registration
#[derive(Clone)]
pub enum DelegateListener {
    /// A plain closure
    Function(ListenerFn),

    /// A handler object
    Handler(Rc<dyn EventHandler>),
}

impl fmt::Debug for DelegateListener {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Function(_) => f.write_str("DelegateListener::Function"),
            Self::Handler(_) => f.write_str("DelegateListener::Handler"),
        }
    }
}

impl DelegateListener {
    /// Wrap a closure
    pub fn function(listener: impl Fn(&Event) -> anyhow::Result<()> + 'static) -> Self {
        Self::Function(Rc::new(listener))
    }

    /// Wrap a handler object
    pub fn handler(handler: impl EventHandler + 'static) -> Self {
        Self::Handler(Rc::new(handler))
    }

    pub fn invoke(&self, event: &Event) -> anyhow::Result<()> {
        match self {
            Self::Function(listener) => listener(event),
            Self::Handler(handler) => handler.handle_event(event),
        }
    }

    /// Adapt into a listener that can be attached to a node directly
    pub fn into_native(self) -> NativeListener {
        match self {
            Self::Function(listener) => listener,
            Self::Handler(handler) => Rc::new(move |event: &Event| handler.handle_event(event)),
        }
    }
}

impl From<Rc<dyn EventHandler>> for DelegateListener {
    fn from(handler: Rc<dyn EventHandler>) -> Self {
        Self::Handler(handler)
    }
}
