//! Event delegation for the Orbit runtime
//!
//! Instead of attaching one native listener per element, delegated
//! listeners are recorded per target inside a `ListenerTracker`, which
//! attaches a single native listener at the publisher (usually the
//! document). When the publisher sees the event, the tracker walks the
//! event path and calls the listeners registered for the nodes on it.

use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::fmt;

use log::debug;

use crate::dom::{ListenerOptions, Node, NodeId};
use crate::events::{DelegateListener, Disposable, ListenerTracker, LookupRecord};

/// Trackers for one event name keyed by publisher and phase
type TrackerMap = HashMap<(NodeId, bool), ListenerTracker>;

/// Registry of delegated listeners.
///
/// Create one per application and call `dispose` at shutdown so no native
/// listeners are left behind.
#[derive(Default)]
pub struct EventManager {
    tracker_maps: RefCell<HashMap<String, TrackerMap>>,
}

impl fmt::Debug for EventManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventManager")
            .field("trackers", &self.tracker_count())
            .finish()
    }
}

impl EventManager {
    /// Create a new, empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `listener` for `event_name` on `target`, delegated through
    /// `publisher`.
    ///
    /// `target` must be `publisher` or one of its descendants for the
    /// listener to ever be reached.
    pub fn add_event_listener(
        &self,
        publisher: &Node,
        target: &Node,
        event_name: &str,
        listener: DelegateListener,
        options: ListenerOptions,
    ) -> DelegateSubscription {
        let tracker = self
            .tracker_maps
            .borrow_mut()
            .entry(event_name.to_owned())
            .or_default()
            .entry((publisher.id(), options.capture))
            .or_insert_with(|| ListenerTracker::new(publisher.clone(), event_name, options))
            .clone();

        let lookup = tracker.get_lookup(target);
        DelegateSubscription::new(tracker, lookup, event_name, listener)
    }

    /// Number of trackers created so far, attached or not
    pub fn tracker_count(&self) -> usize {
        self.tracker_maps.borrow().values().map(HashMap::len).sum()
    }

    /// Whether a native listener is attached for this combination
    pub fn is_tracking(&self, publisher: &Node, event_name: &str, options: ListenerOptions) -> bool {
        self.tracker_maps
            .borrow()
            .get(event_name)
            .and_then(|trackers| trackers.get(&(publisher.id(), options.capture)))
            .is_some_and(ListenerTracker::is_subscribed)
    }

    /// Force-dispose every tracker and forget them
    pub fn dispose(&self) {
        let tracker_maps = std::mem::take(&mut *self.tracker_maps.borrow_mut());
        for (event_name, trackers) in tracker_maps {
            debug!("disposing {} `{}` trackers", trackers.len(), event_name);
            for tracker in trackers.into_values() {
                tracker.dispose();
            }
        }
    }
}

impl Disposable for EventManager {
    fn dispose(&self) {
        EventManager::dispose(self);
    }
}

/// A delegated listener registration.
///
/// Creating it increments the tracker and installs the listener; disposing
/// it decrements the tracker and clears the entry. Dropping the handle
/// without disposing leaves the listener registered.
pub struct DelegateSubscription {
    tracker: ListenerTracker,
    lookup: LookupRecord,
    event_name: String,
    disposed: Cell<bool>,
}

impl fmt::Debug for DelegateSubscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DelegateSubscription")
            .field("event_name", &self.event_name)
            .field("disposed", &self.disposed.get())
            .finish()
    }
}

impl DelegateSubscription {
    /// Register `listener` under `event_name` in `lookup`.
    ///
    /// An existing entry for the same name is replaced without a matching
    /// decrement.
    pub fn new(
        tracker: ListenerTracker,
        lookup: LookupRecord,
        event_name: &str,
        listener: DelegateListener,
    ) -> Self {
        tracker.increment();
        lookup
            .borrow_mut()
            .insert(event_name.to_owned(), Some(listener));
        Self {
            tracker,
            lookup,
            event_name: event_name.to_owned(),
            disposed: Cell::new(false),
        }
    }

    pub fn event_name(&self) -> &str {
        &self.event_name
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed.get()
    }

    pub fn dispose(&self) {
        if self.disposed.replace(true) {
            return;
        }
        self.tracker.decrement();
        if let Some(entry) = self.lookup.borrow_mut().get_mut(&self.event_name) {
            *entry = None;
        }
    }
}

impl Disposable for DelegateSubscription {
    fn dispose(&self) {
        DelegateSubscription::dispose(self);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::Event;
    use crate::events::EventHandler;
    use std::rc::Rc;

    type Log = Rc<RefCell<Vec<&'static str>>>;

    fn record(log: &Log, label: &'static str) -> DelegateListener {
        let log = log.clone();
        DelegateListener::function(move |_event: &Event| {
            log.borrow_mut().push(label);
            Ok(())
        })
    }

    fn tree() -> (Node, Node, Node) {
        let document = Node::document();
        let ancestor = Node::element("section");
        let target = Node::element("button");
        document.append_child(&ancestor);
        ancestor.append_child(&target);
        (document, ancestor, target)
    }

    #[test]
    fn test_one_native_listener_for_many_targets() {
        let document = Node::document();
        let manager = EventManager::new();
        let log: Log = Rc::default();

        let subscriptions: Vec<_> = (0..5)
            .map(|_| {
                let target = Node::element("button");
                document.append_child(&target);
                manager.add_event_listener(
                    &document,
                    &target,
                    "click",
                    record(&log, "click"),
                    ListenerOptions::BUBBLE,
                )
            })
            .collect();

        assert_eq!(document.listener_count("click"), 1);
        assert_eq!(manager.tracker_count(), 1);

        for subscription in &subscriptions {
            subscription.dispose();
        }
        assert_eq!(document.listener_count("click"), 0);
        assert!(!manager.is_tracking(&document, "click", ListenerOptions::BUBBLE));
    }

    #[test]
    fn test_double_dispose_is_idempotent() {
        let (document, ancestor, target) = tree();
        let manager = EventManager::new();
        let log: Log = Rc::default();

        let first = manager.add_event_listener(
            &document,
            &target,
            "click",
            record(&log, "target"),
            ListenerOptions::BUBBLE,
        );
        let _second = manager.add_event_listener(
            &document,
            &ancestor,
            "click",
            record(&log, "ancestor"),
            ListenerOptions::BUBBLE,
        );

        first.dispose();
        first.dispose();
        assert!(first.is_disposed());
        assert!(manager.is_tracking(&document, "click", ListenerOptions::BUBBLE));

        target.dispatch_event(&Event::new("click")).unwrap();
        assert_eq!(*log.borrow(), vec!["ancestor"]);
    }

    #[test]
    fn test_bubble_order_and_cancel() {
        let (document, ancestor, target) = tree();
        let manager = EventManager::new();
        let log: Log = Rc::default();

        let _ancestor = manager.add_event_listener(
            &document,
            &ancestor,
            "click",
            record(&log, "ancestor"),
            ListenerOptions::BUBBLE,
        );
        let target_subscription = manager.add_event_listener(
            &document,
            &target,
            "click",
            record(&log, "target"),
            ListenerOptions::BUBBLE,
        );

        target.dispatch_event(&Event::new("click")).unwrap();
        assert_eq!(*log.borrow(), vec!["target", "ancestor"]);

        target_subscription.dispose();
        log.borrow_mut().clear();
        let stop_log = log.clone();
        let _stopper = manager.add_event_listener(
            &document,
            &target,
            "click",
            DelegateListener::function(move |event: &Event| {
                stop_log.borrow_mut().push("stopper");
                event.set_cancel_bubble(true);
                Ok(())
            }),
            ListenerOptions::BUBBLE,
        );

        target.dispatch_event(&Event::new("click")).unwrap();
        assert_eq!(*log.borrow(), vec!["stopper"]);
    }

    #[test]
    fn test_capture_runs_root_first() {
        let (document, ancestor, target) = tree();
        let manager = EventManager::new();
        let log: Log = Rc::default();

        let _target = manager.add_event_listener(
            &document,
            &target,
            "click",
            record(&log, "target"),
            ListenerOptions::CAPTURE,
        );
        let _ancestor = manager.add_event_listener(
            &document,
            &ancestor,
            "click",
            record(&log, "ancestor"),
            ListenerOptions::CAPTURE,
        );

        target.dispatch_event(&Event::new("click")).unwrap();
        assert_eq!(*log.borrow(), vec!["ancestor", "target"]);
    }

    #[test]
    fn test_capture_and_bubble_use_separate_trackers() {
        let (document, _ancestor, target) = tree();
        let manager = EventManager::new();
        let log: Log = Rc::default();

        let _bubble = manager.add_event_listener(
            &document,
            &target,
            "click",
            record(&log, "bubble"),
            ListenerOptions::BUBBLE,
        );
        let _capture = manager.add_event_listener(
            &document,
            &target,
            "click",
            record(&log, "capture"),
            ListenerOptions::CAPTURE,
        );

        assert_eq!(manager.tracker_count(), 2);
        assert_eq!(document.listener_count("click"), 2);

        target.dispatch_event(&Event::new("click")).unwrap();
        assert_eq!(*log.borrow(), vec!["capture", "bubble"]);
    }

    #[test]
    fn test_non_bubbling_event_reaches_only_capture_delegates() {
        let (document, ancestor, target) = tree();
        let manager = EventManager::new();
        let log: Log = Rc::default();

        let _bubbling = manager.add_event_listener(
            &document,
            &ancestor,
            "focus",
            record(&log, "bubble"),
            ListenerOptions::BUBBLE,
        );
        let capture_log = log.clone();
        let _capturing = manager.add_event_listener(
            &document,
            &ancestor,
            "focus",
            DelegateListener::function(move |event: &Event| {
                capture_log.borrow_mut().push("capture");
                event.prevent_default();
                Ok(())
            }),
            ListenerOptions::CAPTURE,
        );

        let event = Event::non_bubbling("focus");
        assert!(!event.bubbles());
        target.dispatch_event(&event).unwrap();

        assert_eq!(*log.borrow(), vec!["capture"]);
        assert!(event.is_default_prevented());
        assert!(!Event::new("focus").is_default_prevented());
    }

    #[test]
    fn test_handler_object_listener() {
        struct Counter(Rc<Cell<usize>>);

        impl EventHandler for Counter {
            fn handle_event(&self, _event: &Event) -> anyhow::Result<()> {
                self.0.set(self.0.get() + 1);
                Ok(())
            }
        }

        let (document, _ancestor, target) = tree();
        let manager = EventManager::new();
        let count = Rc::new(Cell::new(0));

        let _subscription = manager.add_event_listener(
            &document,
            &target,
            "click",
            DelegateListener::handler(Counter(count.clone())),
            ListenerOptions::BUBBLE,
        );

        target.dispatch_event(&Event::new("click")).unwrap();
        target.dispatch_event(&Event::new("click")).unwrap();
        assert_eq!(count.get(), 2);
    }

    #[test]
    fn test_listener_error_skips_remaining_path() {
        let (document, ancestor, target) = tree();
        let manager = EventManager::new();
        let log: Log = Rc::default();

        let _ancestor = manager.add_event_listener(
            &document,
            &ancestor,
            "click",
            record(&log, "ancestor"),
            ListenerOptions::BUBBLE,
        );
        let _target = manager.add_event_listener(
            &document,
            &target,
            "click",
            DelegateListener::function(|_event: &Event| anyhow::bail!("handler failed")),
            ListenerOptions::BUBBLE,
        );

        let err = target.dispatch_event(&Event::new("click")).unwrap_err();
        assert_eq!(err.to_string(), "handler failed");
        assert!(log.borrow().is_empty());
    }

    #[test]
    fn test_dispose_detaches_everything() {
        let (document, ancestor, target) = tree();
        let manager = EventManager::new();
        let log: Log = Rc::default();

        let subscription = manager.add_event_listener(
            &document,
            &target,
            "click",
            record(&log, "click"),
            ListenerOptions::BUBBLE,
        );
        let _focus = manager.add_event_listener(
            &ancestor,
            &target,
            "focus",
            record(&log, "focus"),
            ListenerOptions::CAPTURE,
        );

        manager.dispose();
        assert_eq!(manager.tracker_count(), 0);
        assert_eq!(document.total_listener_count(), 0);
        assert_eq!(ancestor.total_listener_count(), 0);

        subscription.dispose();
        target.dispatch_event(&Event::new("click")).unwrap();
        assert!(log.borrow().is_empty());
    }

    #[test]
    fn test_listener_can_unsubscribe_during_dispatch() {
        let (document, ancestor, target) = tree();
        let manager = EventManager::new();
        let log: Log = Rc::default();

        let _ancestor = manager.add_event_listener(
            &document,
            &ancestor,
            "click",
            record(&log, "ancestor"),
            ListenerOptions::BUBBLE,
        );
        let slot: Rc<RefCell<Option<DelegateSubscription>>> = Rc::default();
        let handle = slot.clone();
        let once_log = log.clone();
        *slot.borrow_mut() = Some(manager.add_event_listener(
            &document,
            &target,
            "click",
            DelegateListener::function(move |_event: &Event| {
                once_log.borrow_mut().push("once");
                if let Some(subscription) = handle.borrow().as_ref() {
                    subscription.dispose();
                }
                Ok(())
            }),
            ListenerOptions::BUBBLE,
        ));

        target.dispatch_event(&Event::new("click")).unwrap();
        target.dispatch_event(&Event::new("click")).unwrap();
        assert_eq!(*log.borrow(), vec!["once", "ancestor", "ancestor"]);
    }
}
