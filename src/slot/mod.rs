//! Slot-based content projection
//!
//! A consumer of a component can hand it content for named slots. The
//! content is registered against the render instruction that hydrates the
//! component, together with the scope the consumer was bound to. When the
//! component renders an `AuSlot`, it looks the instruction up and either
//! projects the consumer's content, bound to the consumer's scope, or falls
//! back to its own default content.

mod au_slot;

pub use au_slot::AuSlot;

use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::rc::{Rc, Weak};

use log::debug;
use serde::{Deserialize, Serialize};

use crate::scope::Scope;
use crate::view::Template;

/// Where slot content came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentType {
    /// Supplied by the component's consumer
    Projection,
    /// The component's own default content
    Fallback,
}

/// Slot content and the scope it was authored in
#[derive(Clone)]
pub struct ProjectionContext {
    pub content: Rc<dyn Template>,
    pub scope: Option<Rc<Scope>>,
}

impl fmt::Debug for ProjectionContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProjectionContext")
            .field("has_scope", &self.scope.is_some())
            .finish()
    }
}

impl ProjectionContext {
    pub fn new(content: Rc<dyn Template>, scope: Option<Rc<Scope>>) -> Self {
        Self { content, scope }
    }
}

/// Everything an `AuSlot` needs to build its view
#[derive(Debug, Clone)]
pub struct SlotInfo {
    pub name: String,
    pub content_type: ContentType,
    pub projection_context: ProjectionContext,
}

impl SlotInfo {
    pub fn new(
        name: impl Into<String>,
        content_type: ContentType,
        projection_context: ProjectionContext,
    ) -> Self {
        Self {
            name: name.into(),
            content_type,
            projection_context,
        }
    }

    /// Projected content for `name` from `registered` when there is any,
    /// `fallback` otherwise
    pub fn resolve(
        name: impl Into<String>,
        fallback: Rc<dyn Template>,
        registered: Option<&RegisteredProjections>,
    ) -> Self {
        let name = name.into();
        match registered.and_then(|registered| {
            registered
                .projections
                .get(&name)
                .map(|content| (content.clone(), registered.scope.clone()))
        }) {
            Some((content, scope)) => Self::new(
                name,
                ContentType::Projection,
                ProjectionContext::new(content, Some(scope)),
            ),
            None => Self::new(name, ContentType::Fallback, ProjectionContext::new(fallback, None)),
        }
    }
}

/// Slot name to projected content
pub type ProjectionMap = HashMap<String, Rc<dyn Template>>;

/// Projections registered for one render instruction
#[derive(Clone)]
pub struct RegisteredProjections {
    /// Scope the consumer was bound to when it supplied the content
    pub scope: Rc<Scope>,
    pub projections: ProjectionMap,
}

impl fmt::Debug for RegisteredProjections {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut slots: Vec<_> = self.projections.keys().collect();
        slots.sort();
        f.debug_struct("RegisteredProjections")
            .field("slots", &slots)
            .finish()
    }
}

/// Compiled instruction that hydrates a custom element.
///
/// Produced by the template compiler; only its identity matters here.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderInstruction {
    resource: String,
}

impl RenderInstruction {
    pub fn new(resource: impl Into<String>) -> Rc<Self> {
        Rc::new(Self {
            resource: resource.into(),
        })
    }

    /// Name of the element the instruction hydrates
    pub fn resource(&self) -> &str {
        &self.resource
    }
}

struct ProjectionEntry {
    instruction: Weak<RenderInstruction>,
    projections: RegisteredProjections,
}

/// Registry of projected content keyed by render instruction identity.
///
/// Instructions are held weakly, so a registration never keeps its
/// instruction alive. Entries whose instruction is gone read as absent and
/// are dropped on lookup, on the next registration, on `prune`, or through
/// `unregister` when the compiler releases an instruction.
#[derive(Default)]
pub struct ProjectionProvider {
    entries: RefCell<HashMap<usize, ProjectionEntry>>,
}

impl fmt::Debug for ProjectionProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProjectionProvider")
            .field("entries", &self.entries.borrow().len())
            .finish()
    }
}

fn identity(instruction: &Rc<RenderInstruction>) -> usize {
    Rc::as_ptr(instruction) as usize
}

impl ProjectionProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record each instruction's projections together with the scope they
    /// were authored in. Registrations of dropped instructions are pruned
    /// first.
    pub fn register_projections<I>(&self, projections: I, scope: &Rc<Scope>)
    where
        I: IntoIterator<Item = (Rc<RenderInstruction>, ProjectionMap)>,
    {
        let mut entries = self.entries.borrow_mut();
        entries.retain(|_, entry| entry.instruction.strong_count() > 0);
        for (instruction, projections) in projections {
            debug!(
                "registering {} projections for `{}`",
                projections.len(),
                instruction.resource()
            );
            entries.insert(
                identity(&instruction),
                ProjectionEntry {
                    instruction: Rc::downgrade(&instruction),
                    projections: RegisteredProjections {
                        scope: scope.clone(),
                        projections,
                    },
                },
            );
        }
    }

    /// Projections registered for `instruction`, if any
    pub fn get_projection_for(
        &self,
        instruction: &Rc<RenderInstruction>,
    ) -> Option<RegisteredProjections> {
        let key = identity(instruction);
        let mut entries = self.entries.borrow_mut();
        let entry = entries.get(&key)?;
        let live = entry
            .instruction
            .upgrade()
            .is_some_and(|registered| Rc::ptr_eq(&registered, instruction));
        if live {
            Some(entry.projections.clone())
        } else {
            entries.remove(&key);
            None
        }
    }

    /// Drop the registration for `instruction`. Returns whether one existed.
    pub fn unregister(&self, instruction: &Rc<RenderInstruction>) -> bool {
        self.entries
            .borrow_mut()
            .remove(&identity(instruction))
            .is_some()
    }

    /// Drop registrations whose instruction no longer exists. Returns how
    /// many were dropped.
    pub fn prune(&self) -> usize {
        let mut entries = self.entries.borrow_mut();
        let before = entries.len();
        entries.retain(|_, entry| entry.instruction.strong_count() > 0);
        before - entries.len()
    }

    /// Drop every registration
    pub fn clear(&self) {
        self.entries.borrow_mut().clear();
    }

    /// Number of stored registrations, including expired ones not yet
    /// pruned
    pub fn len(&self) -> usize {
        self.entries.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.borrow().is_empty()
    }
}
