//! Reference-counted host nodes

use std::cell::RefCell;
use std::fmt;
use std::rc::{Rc, Weak};
use std::sync::atomic::{AtomicU64, Ordering};

use log::trace;

use super::{Event, ListenerOptions, PropagationPhase};

/// A listener attached directly to a node
pub type NativeListener = Rc<dyn Fn(&Event) -> anyhow::Result<()>>;

/// Unique identifier for a node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(u64);

impl NodeId {
    fn next() -> Self {
        static NEXT_ID: AtomicU64 = AtomicU64::new(1);
        Self(NEXT_ID.fetch_add(1, Ordering::Relaxed))
    }

    pub fn value(&self) -> u64 {
        self.0
    }
}

struct NativeRegistration {
    event_name: String,
    capture: bool,
    listener: NativeListener,
}

struct NodeInner {
    id: NodeId,
    name: String,
    text: RefCell<String>,
    parent: RefCell<Weak<NodeInner>>,
    children: RefCell<Vec<Node>>,
    listeners: RefCell<Vec<NativeRegistration>>,
}

/// A node in the host tree.
///
/// Cloning a `Node` yields another handle to the same node. Equality is
/// identity.
#[derive(Clone)]
pub struct Node(Rc<NodeInner>);

impl PartialEq for Node {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}

impl Eq for Node {}

impl fmt::Debug for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<{}#{}>", self.0.name, self.0.id.0)
    }
}

impl Node {
    fn with_name(name: impl Into<String>, text: String) -> Self {
        Self(Rc::new(NodeInner {
            id: NodeId::next(),
            name: name.into(),
            text: RefCell::new(text),
            parent: RefCell::new(Weak::new()),
            children: RefCell::new(Vec::new()),
            listeners: RefCell::new(Vec::new()),
        }))
    }

    /// Create a detached element node
    pub fn element(name: impl Into<String>) -> Self {
        Self::with_name(name, String::new())
    }

    /// Create a detached text node
    pub fn text(content: impl Into<String>) -> Self {
        Self::with_name("#text", content.into())
    }

    /// Create a document root
    pub fn document() -> Self {
        Self::with_name("#document", String::new())
    }

    pub fn id(&self) -> NodeId {
        self.0.id
    }

    pub fn name(&self) -> &str {
        &self.0.name
    }

    pub fn parent(&self) -> Option<Node> {
        self.0.parent.borrow().upgrade().map(Node)
    }

    pub fn children(&self) -> Vec<Node> {
        self.0.children.borrow().clone()
    }

    /// Append `child`, detaching it from its current parent first
    pub fn append_child(&self, child: &Node) {
        self.insert_before(child, None);
    }

    /// Insert `child` before `reference`, or at the end when the reference
    /// is absent or not a child of this node
    pub fn insert_before(&self, child: &Node, reference: Option<&Node>) {
        child.remove();
        let mut children = self.0.children.borrow_mut();
        let index = reference
            .and_then(|reference| children.iter().position(|c| c == reference))
            .unwrap_or(children.len());
        children.insert(index, child.clone());
        child.0.parent.replace(Rc::downgrade(&self.0));
    }

    /// Detach this node from its parent
    pub fn remove(&self) {
        if let Some(parent) = self.parent() {
            parent.0.children.borrow_mut().retain(|c| c != self);
        }
        self.0.parent.replace(Weak::new());
    }

    /// Whether `self` is `other` or one of its descendants
    pub fn is_within(&self, other: &Node) -> bool {
        let mut current = Some(self.clone());
        while let Some(node) = current {
            if &node == other {
                return true;
            }
            current = node.parent();
        }
        false
    }

    /// Own text followed by the text of all descendants
    pub fn text_content(&self) -> String {
        let mut content = self.0.text.borrow().clone();
        for child in self.0.children.borrow().iter() {
            content.push_str(&child.text_content());
        }
        content
    }

    pub fn set_text_content(&self, text: impl Into<String>) {
        self.0.text.replace(text.into());
    }

    /// Attach a native listener.
    ///
    /// Registering the same listener twice for one event name and phase is
    /// a no-op.
    pub fn add_event_listener(
        &self,
        event_name: &str,
        listener: &NativeListener,
        options: ListenerOptions,
    ) {
        let mut listeners = self.0.listeners.borrow_mut();
        let exists = listeners.iter().any(|registration| {
            registration.event_name == event_name
                && registration.capture == options.capture
                && Rc::ptr_eq(&registration.listener, listener)
        });
        if !exists {
            listeners.push(NativeRegistration {
                event_name: event_name.to_owned(),
                capture: options.capture,
                listener: listener.clone(),
            });
        }
    }

    /// Detach a native listener previously attached with the same options
    pub fn remove_event_listener(
        &self,
        event_name: &str,
        listener: &NativeListener,
        options: ListenerOptions,
    ) {
        self.0.listeners.borrow_mut().retain(|registration| {
            !(registration.event_name == event_name
                && registration.capture == options.capture
                && Rc::ptr_eq(&registration.listener, listener))
        });
    }

    /// Number of native listeners attached for `event_name` in either phase
    pub fn listener_count(&self, event_name: &str) -> usize {
        self.0
            .listeners
            .borrow()
            .iter()
            .filter(|registration| registration.event_name == event_name)
            .count()
    }

    /// Total number of native listeners attached to this node
    pub fn total_listener_count(&self) -> usize {
        self.0.listeners.borrow().len()
    }

    /// Dispatch `event` with this node as its target.
    ///
    /// Capturing listeners run from the root down, then the target's own
    /// listeners, then bubbling listeners from the target up. Setting
    /// `cancel_bubble` stops the walk once the current node's listeners have
    /// run. The first listener error aborts dispatch and is returned.
    pub fn dispatch_event(&self, event: &Event) -> anyhow::Result<()> {
        let mut path = Vec::new();
        let mut current = Some(self.clone());
        while let Some(node) = current {
            current = node.parent();
            path.push(node);
        }

        event.begin_dispatch(self, path.clone());
        let result = Self::propagate(event, &path);
        event.end_dispatch();
        result
    }

    fn propagate(event: &Event, path: &[Node]) -> anyhow::Result<()> {
        let Some((target, ancestors)) = path.split_first() else {
            return Ok(());
        };

        for node in ancestors.iter().rev() {
            node.invoke_listeners(event, PropagationPhase::Capturing, true)?;
            if event.cancel_bubble() {
                return Ok(());
            }
        }

        target.invoke_listeners(event, PropagationPhase::AtTarget, true)?;
        if event.cancel_bubble() {
            return Ok(());
        }
        target.invoke_listeners(event, PropagationPhase::AtTarget, false)?;
        if event.cancel_bubble() || !event.bubbles() {
            return Ok(());
        }

        for node in ancestors {
            node.invoke_listeners(event, PropagationPhase::Bubbling, false)?;
            if event.cancel_bubble() {
                return Ok(());
            }
        }
        Ok(())
    }

    fn invoke_listeners(
        &self,
        event: &Event,
        phase: PropagationPhase,
        capture: bool,
    ) -> anyhow::Result<()> {
        // Snapshot so listeners can add or remove registrations on this node.
        let listeners: Vec<NativeListener> = self
            .0
            .listeners
            .borrow()
            .iter()
            .filter(|r| r.capture == capture && r.event_name == event.event_type())
            .map(|r| r.listener.clone())
            .collect();
        if listeners.is_empty() {
            return Ok(());
        }

        trace!(
            "dispatching `{}` on {:?} ({:?}, {} listeners)",
            event.event_type(),
            self,
            phase,
            listeners.len()
        );
        event.enter(self, phase);
        for listener in listeners {
            listener(event)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;

    fn recorder(log: &Rc<RefCell<Vec<String>>>, label: &str) -> NativeListener {
        let log = log.clone();
        let label = label.to_owned();
        Rc::new(move |_event: &Event| {
            log.borrow_mut().push(label.clone());
            Ok(())
        })
    }

    #[test]
    fn test_tree_insertion_and_removal() {
        let parent = Node::element("div");
        let a = Node::element("a");
        let b = Node::element("b");
        let c = Node::element("c");

        parent.append_child(&a);
        parent.append_child(&c);
        parent.insert_before(&b, Some(&c));
        assert_eq!(parent.children(), vec![a.clone(), b.clone(), c.clone()]);
        assert_eq!(b.parent(), Some(parent.clone()));

        b.remove();
        assert_eq!(parent.children(), vec![a, c]);
        assert!(b.parent().is_none());
    }

    #[test]
    fn test_text_content_concatenates_descendants() {
        let div = Node::element("div");
        div.append_child(&Node::text("Hello, "));
        div.append_child(&Node::text("world"));
        assert_eq!(div.text_content(), "Hello, world");
    }

    #[test]
    fn test_duplicate_listener_is_ignored() {
        let node = Node::element("button");
        let log = Rc::new(RefCell::new(Vec::new()));
        let listener = recorder(&log, "click");

        node.add_event_listener("click", &listener, ListenerOptions::BUBBLE);
        node.add_event_listener("click", &listener, ListenerOptions::BUBBLE);
        assert_eq!(node.listener_count("click"), 1);

        node.add_event_listener("click", &listener, ListenerOptions::CAPTURE);
        assert_eq!(node.listener_count("click"), 2);

        node.remove_event_listener("click", &listener, ListenerOptions::BUBBLE);
        node.remove_event_listener("click", &listener, ListenerOptions::CAPTURE);
        assert_eq!(node.total_listener_count(), 0);
    }

    #[test]
    fn test_dispatch_order() {
        let root = Node::document();
        let parent = Node::element("div");
        let target = Node::element("button");
        root.append_child(&parent);
        parent.append_child(&target);

        let log = Rc::new(RefCell::new(Vec::new()));
        root.add_event_listener("click", &recorder(&log, "root-capture"), ListenerOptions::CAPTURE);
        root.add_event_listener("click", &recorder(&log, "root-bubble"), ListenerOptions::BUBBLE);
        parent.add_event_listener("click", &recorder(&log, "parent-bubble"), ListenerOptions::BUBBLE);
        target.add_event_listener("click", &recorder(&log, "target-bubble"), ListenerOptions::BUBBLE);
        target.add_event_listener("click", &recorder(&log, "target-capture"), ListenerOptions::CAPTURE);

        target.dispatch_event(&Event::new("click")).unwrap();
        assert_eq!(
            *log.borrow(),
            vec![
                "root-capture",
                "target-capture",
                "target-bubble",
                "parent-bubble",
                "root-bubble"
            ]
        );
    }

    #[test]
    fn test_stop_propagation_halts_bubbling() {
        let root = Node::document();
        let target = Node::element("button");
        root.append_child(&target);

        let log = Rc::new(RefCell::new(Vec::new()));
        let stopper: NativeListener = Rc::new(|event: &Event| {
            event.stop_propagation();
            Ok(())
        });
        target.add_event_listener("click", &stopper, ListenerOptions::BUBBLE);
        root.add_event_listener("click", &recorder(&log, "root"), ListenerOptions::BUBBLE);

        target.dispatch_event(&Event::new("click")).unwrap();
        assert!(log.borrow().is_empty());
    }

    #[test]
    fn test_listener_error_aborts_dispatch() {
        let root = Node::document();
        let target = Node::element("button");
        root.append_child(&target);

        let log = Rc::new(RefCell::new(Vec::new()));
        let failing: NativeListener = Rc::new(|_event: &Event| anyhow::bail!("boom"));
        target.add_event_listener("click", &failing, ListenerOptions::BUBBLE);
        root.add_event_listener("click", &recorder(&log, "root"), ListenerOptions::BUBBLE);

        let err = target.dispatch_event(&Event::new("click")).unwrap_err();
        assert_eq!(err.to_string(), "boom");
        assert!(log.borrow().is_empty());
    }
}
