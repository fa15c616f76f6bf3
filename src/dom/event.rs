//! Host events

use std::cell::{Cell, RefCell};
use std::fmt;

use serde::{Deserialize, Serialize};

use super::Node;

/// Specifies the event propagation phase
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PropagationPhase {
    /// Event is not being dispatched
    #[default]
    Idle,

    /// Event is traveling down from the root to the target
    Capturing,

    /// Event is at the target node
    AtTarget,

    /// Event is traveling up from the target to the root
    Bubbling,
}

/// Options passed along with a native listener registration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct ListenerOptions {
    /// Listen during the capturing phase instead of the bubbling phase
    #[serde(default)]
    pub capture: bool,
}

impl ListenerOptions {
    /// Options for a capturing listener
    pub const CAPTURE: Self = Self { capture: true };

    /// Options for a bubbling listener
    pub const BUBBLE: Self = Self { capture: false };
}

/// A host event travelling through a node tree
pub struct Event {
    event_type: String,
    bubbles: bool,
    target: RefCell<Option<Node>>,
    current_target: RefCell<Option<Node>>,
    path: RefCell<Vec<Node>>,
    phase: Cell<PropagationPhase>,
    cancel_bubble: Cell<bool>,
    default_prevented: Cell<bool>,
}

impl fmt::Debug for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Event")
            .field("event_type", &self.event_type)
            .field("bubbles", &self.bubbles)
            .field("target", &self.target.borrow())
            .field("phase", &self.phase.get())
            .field("cancel_bubble", &self.cancel_bubble.get())
            .finish()
    }
}

impl Event {
    /// Create a new bubbling event
    pub fn new(event_type: impl Into<String>) -> Self {
        Self::with_bubbles(event_type, true)
    }

    /// Create an event that only reaches capturing and at-target listeners
    pub fn non_bubbling(event_type: impl Into<String>) -> Self {
        Self::with_bubbles(event_type, false)
    }

    fn with_bubbles(event_type: impl Into<String>, bubbles: bool) -> Self {
        Self {
            event_type: event_type.into(),
            bubbles,
            target: RefCell::new(None),
            current_target: RefCell::new(None),
            path: RefCell::new(Vec::new()),
            phase: Cell::new(PropagationPhase::Idle),
            cancel_bubble: Cell::new(false),
            default_prevented: Cell::new(false),
        }
    }

    pub fn event_type(&self) -> &str {
        &self.event_type
    }

    pub fn bubbles(&self) -> bool {
        self.bubbles
    }

    /// The node the event was dispatched on
    pub fn target(&self) -> Option<Node> {
        self.target.borrow().clone()
    }

    /// The node whose native listeners are currently running
    pub fn current_target(&self) -> Option<Node> {
        self.current_target.borrow().clone()
    }

    pub fn phase(&self) -> PropagationPhase {
        self.phase.get()
    }

    /// Propagation path from the target up to the root.
    ///
    /// Empty outside of dispatch.
    pub fn composed_path(&self) -> Vec<Node> {
        self.path.borrow().clone()
    }

    pub fn cancel_bubble(&self) -> bool {
        self.cancel_bubble.get()
    }

    pub fn set_cancel_bubble(&self, value: bool) {
        self.cancel_bubble.set(value);
    }

    /// Stop event propagation after the current node's listeners
    pub fn stop_propagation(&self) {
        self.cancel_bubble.set(true);
    }

    /// Prevent the default action
    pub fn prevent_default(&self) {
        self.default_prevented.set(true);
    }

    pub fn is_default_prevented(&self) -> bool {
        self.default_prevented.get()
    }

    pub(crate) fn begin_dispatch(&self, target: &Node, path: Vec<Node>) {
        self.target.replace(Some(target.clone()));
        self.path.replace(path);
        self.cancel_bubble.set(false);
    }

    pub(crate) fn enter(&self, node: &Node, phase: PropagationPhase) {
        self.current_target.replace(Some(node.clone()));
        self.phase.set(phase);
    }

    pub(crate) fn end_dispatch(&self) {
        self.current_target.replace(None);
        self.path.replace(Vec::new());
        self.phase.set(PropagationPhase::Idle);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_path_is_empty_outside_dispatch() {
        let root = Node::element("root");
        let child = Node::element("child");
        root.append_child(&child);

        let event = Event::new("click");
        assert!(event.composed_path().is_empty());

        child.dispatch_event(&event).unwrap();
        assert!(event.composed_path().is_empty());
        assert_eq!(event.target(), Some(child));
        assert_eq!(event.phase(), PropagationPhase::Idle);
    }

    #[test]
    fn test_listener_options_from_json() {
        let options: ListenerOptions = serde_json::from_str(r#"{"capture":true}"#).unwrap();
        assert_eq!(options, ListenerOptions::CAPTURE);

        let options: ListenerOptions = serde_json::from_str("{}").unwrap();
        assert_eq!(options, ListenerOptions::BUBBLE);
    }
}
