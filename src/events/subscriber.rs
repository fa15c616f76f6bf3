//! Direct, non-delegated subscriptions on a single node

use std::cell::RefCell;
use std::fmt;

use log::debug;

use crate::config::EventSubscriberConfig;
use crate::dom::{ListenerOptions, NativeListener, Node};
use crate::events::{DelegateListener, Disposable};

/// Attaches one listener directly to one node for every configured event.
///
/// Used where delegation does not fit, such as form controls observing
/// their own `input`/`change` events. There is no reference counting: a
/// subscriber owns the subscriptions of exactly one node at a time.
pub struct EventSubscriber {
    config: EventSubscriberConfig,
    subscription: RefCell<Option<(Node, NativeListener)>>,
}

impl fmt::Debug for EventSubscriber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventSubscriber")
            .field("events", &self.config.events)
            .field("subscribed", &self.is_subscribed())
            .finish()
    }
}

impl EventSubscriber {
    pub fn new(config: EventSubscriberConfig) -> Self {
        Self {
            config,
            subscription: RefCell::new(None),
        }
    }

    pub fn config(&self) -> &EventSubscriberConfig {
        &self.config
    }

    pub fn is_subscribed(&self) -> bool {
        self.subscription.borrow().is_some()
    }

    /// Attach `listener` to `node` for each configured event.
    ///
    /// A previous subscription held by this subscriber is removed first.
    pub fn subscribe(&self, node: &Node, listener: DelegateListener) {
        self.dispose();

        let native = listener.into_native();
        for event_name in &self.config.events {
            node.add_event_listener(event_name, &native, ListenerOptions::BUBBLE);
        }
        debug!("subscribed {:?} to {:?}", node, self.config.events);
        self.subscription.replace(Some((node.clone(), native)));
    }

    /// Detach every listener and drop the stored node and listener
    pub fn dispose(&self) {
        let Some((node, native)) = self.subscription.take() else {
            return;
        };
        for event_name in &self.config.events {
            node.remove_event_listener(event_name, &native, ListenerOptions::BUBBLE);
        }
    }
}

impl Disposable for EventSubscriber {
    fn dispose(&self) {
        EventSubscriber::dispose(self);
    }
}
