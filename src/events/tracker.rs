//! Reference-counted native subscriptions shared by delegated listeners

use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::fmt;
use std::rc::{Rc, Weak};

use log::{debug, trace};

use crate::dom::{Event, ListenerOptions, NativeListener, Node, NodeId};
use crate::events::DelegateListener;

/// Event name to listener record for one target.
///
/// A cleared entry is kept as `None` rather than removed.
pub type LookupRecord = Rc<RefCell<HashMap<String, Option<DelegateListener>>>>;

type LookupTable = RefCell<HashMap<NodeId, LookupRecord>>;

struct TrackerInner {
    publisher: Node,
    event_name: String,
    options: ListenerOptions,
    count: Cell<usize>,
    capture_lookups: LookupTable,
    bubble_lookups: LookupTable,
    native: NativeListener,
}

/// Owns the single native subscription for one (publisher, event, phase).
///
/// The native listener is attached while at least one delegated
/// subscription is alive. On dispatch it walks the event path and invokes
/// the listener registered for each node on it.
#[derive(Clone)]
pub struct ListenerTracker(Rc<TrackerInner>);

impl fmt::Debug for ListenerTracker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ListenerTracker")
            .field("publisher", &self.0.publisher)
            .field("event_name", &self.0.event_name)
            .field("options", &self.0.options)
            .field("count", &self.0.count.get())
            .finish()
    }
}

impl ListenerTracker {
    pub fn new(publisher: Node, event_name: impl Into<String>, options: ListenerOptions) -> Self {
        let event_name = event_name.into();
        Self(Rc::new_cyclic(|weak: &Weak<TrackerInner>| {
            let weak = weak.clone();
            let native: NativeListener = Rc::new(move |event: &Event| match weak.upgrade() {
                Some(inner) => ListenerTracker(inner).handle_event(event),
                None => Ok(()),
            });
            TrackerInner {
                publisher,
                event_name,
                options,
                count: Cell::new(0),
                capture_lookups: RefCell::new(HashMap::new()),
                bubble_lookups: RefCell::new(HashMap::new()),
                native,
            }
        }))
    }

    pub fn publisher(&self) -> &Node {
        &self.0.publisher
    }

    pub fn event_name(&self) -> &str {
        &self.0.event_name
    }

    pub fn options(&self) -> ListenerOptions {
        self.0.options
    }

    /// Number of live delegated subscriptions
    pub fn count(&self) -> usize {
        self.0.count.get()
    }

    /// Whether the native listener is currently attached
    pub fn is_subscribed(&self) -> bool {
        self.count() > 0
    }

    pub fn increment(&self) {
        let count = self.0.count.get() + 1;
        self.0.count.set(count);
        if count == 1 {
            debug!(
                "attaching native `{}` listener on {:?} (capture: {})",
                self.0.event_name, self.0.publisher, self.0.options.capture
            );
            self.0
                .publisher
                .add_event_listener(&self.0.event_name, &self.0.native, self.0.options);
        }
    }

    pub fn decrement(&self) {
        let count = self.0.count.get();
        if count == 0 {
            return;
        }
        self.0.count.set(count - 1);
        if count == 1 {
            self.detach_native();
        }
    }

    /// Detach the native listener regardless of the count and forget every
    /// lookup record
    pub fn dispose(&self) {
        if self.0.count.get() > 0 {
            self.0.count.set(0);
            self.detach_native();
        }
        self.0.capture_lookups.borrow_mut().clear();
        self.0.bubble_lookups.borrow_mut().clear();
    }

    fn detach_native(&self) {
        debug!(
            "detaching native `{}` listener from {:?} (capture: {})",
            self.0.event_name, self.0.publisher, self.0.options.capture
        );
        self.0
            .publisher
            .remove_event_listener(&self.0.event_name, &self.0.native, self.0.options);
    }

    fn lookups(&self) -> &LookupTable {
        if self.0.options.capture {
            &self.0.capture_lookups
        } else {
            &self.0.bubble_lookups
        }
    }

    /// Listener record for `target`, created on first access
    pub fn get_lookup(&self, target: &Node) -> LookupRecord {
        self.lookups()
            .borrow_mut()
            .entry(target.id())
            .or_default()
            .clone()
    }

    /// Invoke the delegated listeners found along the event path.
    ///
    /// A node without a listener is skipped; `cancel_bubble` set by an
    /// invoked listener ends the walk. Listener errors propagate and end
    /// the walk as well.
    pub fn handle_event(&self, event: &Event) -> anyhow::Result<()> {
        let mut path = event.composed_path();
        if self.0.options.capture {
            path.reverse();
        }

        for node in &path {
            let record = self.lookups().borrow().get(&node.id()).cloned();
            let Some(record) = record else {
                continue;
            };
            let entry = record.borrow().get(&self.0.event_name).cloned().flatten();
            let Some(listener) = entry else {
                continue;
            };

            trace!("delegated `{}` reached {:?}", self.0.event_name, node);
            listener.invoke(event)?;
            if event.cancel_bubble() {
                break;
            }
        }
        Ok(())
    }
}
