//! In-memory host DOM for the Orbit runtime
//!
//! The runtime only depends on a handful of host primitives:
//! - `add_event_listener` / `remove_event_listener` on a node
//! - `Event::composed_path` and `Event::cancel_bubble`
//! - node insertion and removal for view node ranges
//!
//! This module provides them over a reference-counted node tree with a
//! capture / target / bubble dispatch algorithm.

mod event;
mod node;

pub use event::{Event, ListenerOptions, PropagationPhase};
pub use node::{NativeListener, Node, NodeId};
