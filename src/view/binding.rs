//! Bindings connect a view's nodes to the scope it is activated with

use std::fmt;
use std::rc::Rc;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::config::EventSubscriberConfig;
use crate::dom::{Event, ListenerOptions, Node};
use crate::events::{DelegateListener, Disposable, EventManager, EventSubscriber};
use crate::scope::Scope;
use crate::view::ViewError;

/// A connection between a scope and part of a view
pub trait Binding {
    /// Connect to `scope`
    fn bind(&mut self, scope: &Rc<Scope>) -> Result<(), ViewError>;

    /// Disconnect. Does nothing when not bound.
    fn unbind(&mut self);

    fn is_bound(&self) -> bool;
}

/// Writes the value found at a scope path into a node's text
#[derive(Debug)]
pub struct TextBinding {
    target: Node,
    path: String,
    bound: bool,
}

impl TextBinding {
    pub fn new(target: &Node, path: impl Into<String>) -> Self {
        Self {
            target: target.clone(),
            path: path.into(),
            bound: false,
        }
    }
}

impl Binding for TextBinding {
    fn bind(&mut self, scope: &Rc<Scope>) -> Result<(), ViewError> {
        let text = match scope.get_path(&self.path) {
            None | Some(Value::Null) => String::new(),
            Some(Value::String(text)) => text,
            Some(other) => other.to_string(),
        };
        self.target.set_text_content(text);
        self.bound = true;
        Ok(())
    }

    fn unbind(&mut self) {
        self.bound = false;
    }

    fn is_bound(&self) -> bool {
        self.bound
    }
}

/// How a listener binding reaches its target
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DelegationStrategy {
    /// Attach directly on the target
    None,

    /// Delegate through the publisher's capturing tracker
    Capturing,

    /// Delegate through the publisher's bubbling tracker
    #[default]
    Bubbling,
}

/// Event handler that also receives the scope the binding is bound to
pub type ScopedHandler = Rc<dyn Fn(&Event, &Rc<Scope>) -> anyhow::Result<()>>;

/// Binds an event listener on a target for as long as the view is bound
pub struct ListenerBinding {
    manager: Rc<EventManager>,
    publisher: Node,
    target: Node,
    event_name: String,
    strategy: DelegationStrategy,
    handler: ScopedHandler,
    subscription: Option<Box<dyn Disposable>>,
}

impl fmt::Debug for ListenerBinding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ListenerBinding")
            .field("target", &self.target)
            .field("event_name", &self.event_name)
            .field("strategy", &self.strategy)
            .field("bound", &self.is_bound())
            .finish()
    }
}

impl ListenerBinding {
    pub fn new(
        manager: &Rc<EventManager>,
        publisher: &Node,
        target: &Node,
        event_name: impl Into<String>,
        strategy: DelegationStrategy,
        handler: impl Fn(&Event, &Rc<Scope>) -> anyhow::Result<()> + 'static,
    ) -> Self {
        Self {
            manager: manager.clone(),
            publisher: publisher.clone(),
            target: target.clone(),
            event_name: event_name.into(),
            strategy,
            handler: Rc::new(handler),
            subscription: None,
        }
    }

    pub fn strategy(&self) -> DelegationStrategy {
        self.strategy
    }
}

impl Binding for ListenerBinding {
    fn bind(&mut self, scope: &Rc<Scope>) -> Result<(), ViewError> {
        self.unbind();

        let handler = self.handler.clone();
        let scope = scope.clone();
        let listener = DelegateListener::function(move |event: &Event| handler(event, &scope));

        let subscription: Box<dyn Disposable> = match self.strategy {
            DelegationStrategy::None => {
                let subscriber =
                    EventSubscriber::new(EventSubscriberConfig::new([self.event_name.as_str()]));
                subscriber.subscribe(&self.target, listener);
                Box::new(subscriber)
            }
            DelegationStrategy::Capturing | DelegationStrategy::Bubbling => {
                let options = ListenerOptions {
                    capture: self.strategy == DelegationStrategy::Capturing,
                };
                Box::new(self.manager.add_event_listener(
                    &self.publisher,
                    &self.target,
                    &self.event_name,
                    listener,
                    options,
                ))
            }
        };
        self.subscription = Some(subscription);
        Ok(())
    }

    fn unbind(&mut self) {
        if let Some(subscription) = self.subscription.take() {
            subscription.dispose();
        }
    }

    fn is_bound(&self) -> bool {
        self.subscription.is_some()
    }
}
