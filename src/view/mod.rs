//! View model for the Orbit runtime
//!
//! A `ViewFactory` renders a template into a `View`: a detached range of
//! nodes plus the bindings and child components that belong to it. Views are
//! activated against a scope, attached at their location, and later
//! deactivated in reverse order. Deactivated views may be reused through the
//! factory cache.

mod binding;
mod error;
mod with;


pub use binding::{Binding, DelegationStrategy, ListenerBinding, ScopedHandler, TextBinding};
pub use error::ViewError;
pub use with::With;

use std::cell::{Cell, RefCell};
use std::fmt;
use std::ops::BitOr;
use std::rc::{Rc, Weak};
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use log::{debug, warn};

use crate::dom::Node;
use crate::scope::Scope;
use crate::slot::ContentType;

/// Lifecycle phase of a view
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecyclePhase {
    /// Created or deactivated; may be activated
    Inactive,
    /// Activation is in progress
    Activating,
    /// Bound and attached
    Active,
    /// Deactivation is in progress
    Deactivating,
    /// Released; can no longer be activated
    Disposed,
}

/// Modifiers passed along a lifecycle call
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Hash)]
pub struct LifecycleFlags(u8);

impl LifecycleFlags {
    pub const NONE: Self = Self(0);
    /// The call was propagated from a parent view
    pub const FROM_PARENT: Self = Self(1);
    /// Dispose the view once deactivation completes
    pub const DISPOSE: Self = Self(1 << 1);

    pub fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }
}

impl BitOr for LifecycleFlags {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

/// Hooks a template can attach to the views rendered from it
#[async_trait(?Send)]
pub trait ViewHooks {
    /// Before bindings are bound
    async fn binding(&self, _view: &View) -> anyhow::Result<()> {
        Ok(())
    }

    /// After child components are active, before nodes are attached
    async fn attaching(&self, _view: &View) -> anyhow::Result<()> {
        Ok(())
    }

    /// Before child components are deactivated
    async fn detaching(&self, _view: &View) -> anyhow::Result<()> {
        Ok(())
    }

    /// After nodes are removed, before bindings are unbound
    async fn unbinding(&self, _view: &View) -> anyhow::Result<()> {
        Ok(())
    }
}

/// A component living inside a view, activated with it
#[async_trait(?Send)]
pub trait ViewComponent {
    /// Activate as part of `parent`, which is bound to `host_scope`
    async fn activate(
        &self,
        initiator: &View,
        parent: &View,
        flags: LifecycleFlags,
        host_scope: &Rc<Scope>,
    ) -> Result<(), ViewError>;

    async fn deactivate(
        &self,
        initiator: &View,
        parent: &View,
        flags: LifecycleFlags,
    ) -> Result<(), ViewError>;

    fn dispose(&self);
}

/// Output of a template render
#[derive(Default)]
pub struct RenderedView {
    nodes: Vec<Node>,
    bindings: Vec<Box<dyn Binding>>,
    components: Vec<Rc<dyn ViewComponent>>,
    hooks: Option<Rc<dyn ViewHooks>>,
}

impl RenderedView {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a top-level node to the view's range
    pub fn node(mut self, node: Node) -> Self {
        self.nodes.push(node);
        self
    }

    pub fn binding(mut self, binding: impl Binding + 'static) -> Self {
        self.bindings.push(Box::new(binding));
        self
    }

    pub fn component(mut self, component: Rc<dyn ViewComponent>) -> Self {
        self.components.push(component);
        self
    }

    pub fn hooks(mut self, hooks: Rc<dyn ViewHooks>) -> Self {
        self.hooks = Some(hooks);
        self
    }
}

/// Produces fresh view content
pub trait Template {
    fn render(&self) -> RenderedView;
}

impl<F> Template for F
where
    F: Fn() -> RenderedView,
{
    fn render(&self) -> RenderedView {
        self()
    }
}

struct FactoryDefinition {
    name: String,
    template: Rc<dyn Template>,
    content_type: Option<ContentType>,
    projection_scope: Option<Rc<Scope>>,
}

impl FactoryDefinition {
    /// Captured projection scope, then the binding scope, then the host scope
    fn resolve_scope(
        &self,
        scope: Option<&Rc<Scope>>,
        host_scope: Option<&Rc<Scope>>,
    ) -> Option<Rc<Scope>> {
        if self.content_type == Some(ContentType::Projection) {
            if let Some(projection_scope) = &self.projection_scope {
                return Some(projection_scope.clone());
            }
        }
        scope.or(host_scope).cloned()
    }
}

#[derive(Default)]
struct ViewCache {
    size: usize,
    size_set: bool,
    views: Vec<View>,
}

/// Creates views from a template
#[derive(Clone)]
pub struct ViewFactory {
    definition: Rc<FactoryDefinition>,
    cache: Rc<RefCell<ViewCache>>,
}

impl fmt::Debug for ViewFactory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ViewFactory")
            .field("name", &self.definition.name)
            .field("content_type", &self.definition.content_type)
            .field("has_projection_scope", &self.definition.projection_scope.is_some())
            .field("cached", &self.cache.borrow().views.len())
            .finish()
    }
}

impl ViewFactory {
    pub fn new(name: impl Into<String>, template: impl Template + 'static) -> Self {
        Self::from_definition(FactoryDefinition {
            name: name.into(),
            template: Rc::new(template),
            content_type: None,
            projection_scope: None,
        })
    }

    /// A factory for slot content, carrying the scope the content was
    /// authored in when it is projected
    pub fn for_slot(
        name: impl Into<String>,
        template: Rc<dyn Template>,
        content_type: ContentType,
        projection_scope: Option<Rc<Scope>>,
    ) -> Self {
        Self::from_definition(FactoryDefinition {
            name: name.into(),
            template,
            content_type: Some(content_type),
            projection_scope,
        })
    }

    fn from_definition(definition: FactoryDefinition) -> Self {
        Self {
            definition: Rc::new(definition),
            cache: Rc::default(),
        }
    }

    pub fn name(&self) -> &str {
        &self.definition.name
    }

    pub fn content_type(&self) -> Option<ContentType> {
        self.definition.content_type
    }

    pub fn projection_scope(&self) -> Option<&Rc<Scope>> {
        self.definition.projection_scope.as_ref()
    }

    /// Scope a view from this factory binds against
    pub fn resolve_scope(
        &self,
        scope: Option<&Rc<Scope>>,
        host_scope: Option<&Rc<Scope>>,
    ) -> Option<Rc<Scope>> {
        self.definition.resolve_scope(scope, host_scope)
    }

    /// Set how many deactivated views are kept for reuse.
    ///
    /// With `keep_existing`, a size that was already set is left alone.
    pub fn set_cache_size(&self, size: usize, keep_existing: bool) {
        let mut cache = self.cache.borrow_mut();
        if keep_existing && cache.size_set {
            return;
        }
        cache.size = size;
        cache.size_set = true;
        cache.views.truncate(size);
    }

    /// Offer an inactive view from this factory back for reuse
    pub fn try_return_to_cache(&self, view: &View) -> bool {
        if !Rc::ptr_eq(&view.0.definition, &self.definition)
            || view.phase() != LifecyclePhase::Inactive
        {
            return false;
        }
        let mut cache = self.cache.borrow_mut();
        if cache.views.len() >= cache.size || cache.views.contains(view) {
            return false;
        }
        cache.views.push(view.clone());
        true
    }

    /// Take a cached view, or render a new one with detached nodes
    pub fn create(&self) -> View {
        {
            let mut cache = self.cache.borrow_mut();
            while let Some(view) = cache.views.pop() {
                if view.phase() == LifecyclePhase::Inactive {
                    return view;
                }
            }
        }

        let rendered = self.definition.template.render();
        View(Rc::new(ViewInner {
            id: ViewId::next(),
            definition: self.definition.clone(),
            phase: Cell::new(LifecyclePhase::Inactive),
            nodes: RefCell::new(rendered.nodes),
            bindings: RefCell::new(rendered.bindings),
            components: RefCell::new(rendered.components),
            active_components: Cell::new(0),
            hooks: rendered.hooks,
            location: RefCell::new(None),
            scope: RefCell::new(None),
            host_scope: RefCell::new(None),
            parent: RefCell::new(Weak::new()),
        }))
    }
}

/// Unique identifier for a view
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ViewId(u64);

impl ViewId {
    fn next() -> Self {
        static NEXT_ID: AtomicU64 = AtomicU64::new(1);
        Self(NEXT_ID.fetch_add(1, Ordering::Relaxed))
    }
}

#[derive(Debug, Clone)]
enum RenderLocation {
    /// Append to this node
    Host(Node),
    /// Insert before this node
    Anchor(Node),
}

struct ViewInner {
    id: ViewId,
    definition: Rc<FactoryDefinition>,
    phase: Cell<LifecyclePhase>,
    nodes: RefCell<Vec<Node>>,
    bindings: RefCell<Vec<Box<dyn Binding>>>,
    components: RefCell<Vec<Rc<dyn ViewComponent>>>,
    active_components: Cell<usize>,
    hooks: Option<Rc<dyn ViewHooks>>,
    location: RefCell<Option<RenderLocation>>,
    scope: RefCell<Option<Rc<Scope>>>,
    host_scope: RefCell<Option<Rc<Scope>>>,
    parent: RefCell<Weak<ViewInner>>,
}

/// A rendered, activatable range of nodes
#[derive(Clone)]
pub struct View(Rc<ViewInner>);

impl PartialEq for View {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}

impl fmt::Debug for View {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("View")
            .field("id", &self.0.id)
            .field("name", &self.0.definition.name)
            .field("phase", &self.0.phase.get())
            .finish()
    }
}

impl View {
    pub fn id(&self) -> ViewId {
        self.0.id
    }

    pub fn name(&self) -> &str {
        &self.0.definition.name
    }

    pub fn phase(&self) -> LifecyclePhase {
        self.0.phase.get()
    }

    pub fn content_type(&self) -> Option<ContentType> {
        self.0.definition.content_type
    }

    /// Scope the view is bound to while active
    pub fn scope(&self) -> Option<Rc<Scope>> {
        self.0.scope.borrow().clone()
    }

    /// Host scope passed with the last activation
    pub fn host_scope(&self) -> Option<Rc<Scope>> {
        self.0.host_scope.borrow().clone()
    }

    pub fn parent(&self) -> Option<View> {
        self.0.parent.borrow().upgrade().map(View)
    }

    /// Top-level nodes of the view's range
    pub fn nodes(&self) -> Vec<Node> {
        self.0.nodes.borrow().clone()
    }

    /// Attach nodes as the last children of `host` on activation
    pub fn set_host(&self, host: &Node) {
        self.0
            .location
            .replace(Some(RenderLocation::Host(host.clone())));
    }

    /// Attach nodes before `anchor` on activation
    pub fn set_location(&self, anchor: &Node) {
        self.0
            .location
            .replace(Some(RenderLocation::Anchor(anchor.clone())));
    }

    /// Bind the view and attach its nodes.
    ///
    /// The scope is resolved from the factory's captured projection scope,
    /// then `scope`, then `host_scope`. On failure everything done so far is
    /// undone and the view returns to `Inactive`.
    pub async fn activate(
        &self,
        initiator: Option<&View>,
        parent: Option<&View>,
        flags: LifecycleFlags,
        scope: Option<Rc<Scope>>,
        host_scope: Option<Rc<Scope>>,
    ) -> Result<(), ViewError> {
        let phase = self.phase();
        if phase != LifecyclePhase::Inactive {
            return Err(ViewError::InvalidLifecycleTransition {
                phase,
                operation: "activate",
            });
        }
        let resolved = self
            .0
            .definition
            .resolve_scope(scope.as_ref(), host_scope.as_ref())
            .ok_or_else(|| ViewError::MissingScope(self.name().to_owned()))?;

        debug!("activating {:?} ({:?})", self, flags);
        self.0.phase.set(LifecyclePhase::Activating);
        self.0
            .parent
            .replace(parent.map(|parent| Rc::downgrade(&parent.0)).unwrap_or_default());
        self.0.scope.replace(Some(resolved.clone()));
        self.0.host_scope.replace(host_scope);

        let initiator = initiator.unwrap_or(self);
        let result = self.bind_and_attach(initiator, flags, &resolved).await;
        if self.phase() == LifecyclePhase::Disposed {
            return Err(ViewError::InvalidLifecycleTransition {
                phase: LifecyclePhase::Disposed,
                operation: "activate",
            });
        }
        match result {
            Ok(()) => {
                self.0.phase.set(LifecyclePhase::Active);
                Ok(())
            }
            Err(err) => {
                warn!("activation of {:?} failed: {}", self, err);
                if let Err(rollback) = self.release(initiator, flags, false).await {
                    warn!("rollback of {:?} failed: {}", self, rollback);
                }
                self.0.phase.set(LifecyclePhase::Inactive);
                Err(err)
            }
        }
    }

    async fn bind_and_attach(
        &self,
        initiator: &View,
        flags: LifecycleFlags,
        scope: &Rc<Scope>,
    ) -> Result<(), ViewError> {
        if let Some(hooks) = &self.0.hooks {
            hooks.binding(self).await.map_err(ViewError::hook("binding"))?;
        }

        for binding in self.0.bindings.borrow_mut().iter_mut() {
            binding.bind(scope)?;
        }

        let components = self.0.components.borrow().clone();
        let child_flags = flags | LifecycleFlags::FROM_PARENT;
        for component in &components {
            component.activate(initiator, self, child_flags, scope).await?;
            self.0.active_components.set(self.0.active_components.get() + 1);
        }

        if let Some(hooks) = &self.0.hooks {
            hooks.attaching(self).await.map_err(ViewError::hook("attaching"))?;
        }
        self.attach_nodes();
        Ok(())
    }

    fn attach_nodes(&self) {
        let location = self.0.location.borrow().clone();
        let nodes = self.nodes();
        match location {
            Some(RenderLocation::Host(host)) => {
                for node in &nodes {
                    host.append_child(node);
                }
            }
            Some(RenderLocation::Anchor(anchor)) => {
                if let Some(parent) = anchor.parent() {
                    for node in &nodes {
                        parent.insert_before(node, Some(&anchor));
                    }
                }
            }
            None => {}
        }
    }

    /// Unbind the view and detach its nodes.
    ///
    /// Does nothing on an inactive view. Child components are deactivated in
    /// reverse order of activation. Teardown runs to completion even when a
    /// step fails; the first error is returned.
    pub async fn deactivate(
        &self,
        initiator: Option<&View>,
        parent: Option<&View>,
        flags: LifecycleFlags,
    ) -> Result<(), ViewError> {
        match self.phase() {
            LifecyclePhase::Inactive => return Ok(()),
            LifecyclePhase::Active => {}
            phase => {
                return Err(ViewError::InvalidLifecycleTransition {
                    phase,
                    operation: "deactivate",
                })
            }
        }

        debug!("deactivating {:?} from {:?} ({:?})", self, parent, flags);
        self.0.phase.set(LifecyclePhase::Deactivating);
        let initiator = initiator.unwrap_or(self);
        let result = self.release(initiator, flags, true).await;
        self.0.parent.replace(Weak::new());
        if self.phase() == LifecyclePhase::Disposed {
            return result;
        }
        self.0.phase.set(LifecyclePhase::Inactive);

        if flags.contains(LifecycleFlags::DISPOSE) {
            self.dispose();
        }
        result
    }

    async fn release(
        &self,
        initiator: &View,
        flags: LifecycleFlags,
        run_hooks: bool,
    ) -> Result<(), ViewError> {
        let mut first_error: Option<ViewError> = None;

        if run_hooks {
            if let Some(hooks) = &self.0.hooks {
                if let Err(error) = hooks.detaching(self).await {
                    first_error.get_or_insert(ViewError::Hook {
                        hook: "detaching",
                        error,
                    });
                }
            }
        }

        let components = self.0.components.borrow().clone();
        let active = self.0.active_components.replace(0).min(components.len());
        let child_flags = flags | LifecycleFlags::FROM_PARENT;
        for component in components[..active].iter().rev() {
            if let Err(err) = component.deactivate(initiator, self, child_flags).await {
                first_error.get_or_insert(err);
            }
        }

        for node in self.nodes() {
            node.remove();
        }

        if run_hooks {
            if let Some(hooks) = &self.0.hooks {
                if let Err(error) = hooks.unbinding(self).await {
                    first_error.get_or_insert(ViewError::Hook {
                        hook: "unbinding",
                        error,
                    });
                }
            }
        }

        for binding in self.0.bindings.borrow_mut().iter_mut().rev() {
            binding.unbind();
        }
        self.0.scope.replace(None);

        match first_error {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    /// Release the view's resources. It can no longer be activated or
    /// cached, even when called from a hook mid-transition. Repeated calls
    /// do nothing.
    pub fn dispose(&self) {
        if self.phase() == LifecyclePhase::Disposed {
            return;
        }
        debug!("disposing {:?}", self);
        self.0.phase.set(LifecyclePhase::Disposed);

        let components = self.0.components.take();
        for component in components.iter().rev() {
            component.dispose();
        }
        self.0.active_components.set(0);
        for node in self.0.nodes.take() {
            node.remove();
        }
        for mut binding in self.0.bindings.take().into_iter().rev() {
            binding.unbind();
        }
        self.0.scope.replace(None);
        self.0.host_scope.replace(None);
        self.0.location.replace(None);
    }
}
