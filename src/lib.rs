// Runtime core of the Orbit UI Framework
pub mod config;
pub mod dom;
pub mod events;
pub mod scope;
pub mod slot;
pub mod view;

use std::cell::Cell;
use std::path::Path;
use std::rc::Rc;

use log::debug;

use crate::config::{ConfigError, RuntimeConfig};
use crate::dom::{Event, Node};
use crate::events::{EventManager, EventSubscriber};
use crate::scope::Scope;
use crate::slot::ProjectionProvider;
use crate::view::{ListenerBinding, Template, ViewError, ViewFactory};

/// Version of the Orbit runtime
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Re-export of common types for convenience
pub mod prelude {
    pub use crate::config::{EventSubscriberConfig, RuntimeConfig};
    pub use crate::dom::{Event, ListenerOptions, Node, PropagationPhase};
    pub use crate::events::{
        DelegateListener, DelegateSubscription, Disposable, EventHandler, EventManager,
        EventSubscriber,
    };
    pub use crate::scope::Scope;
    pub use crate::slot::{
        AuSlot, ContentType, ProjectionContext, ProjectionProvider, RegisteredProjections,
        RenderInstruction, SlotInfo,
    };
    pub use crate::view::{
        Binding, DelegationStrategy, LifecycleFlags, LifecyclePhase, ListenerBinding,
        RenderedView, Template, TextBinding, View, ViewComponent, ViewError, ViewFactory,
        ViewHooks, With,
    };
    pub use crate::Runtime;
}

/// Errors that can occur in the Orbit runtime
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("View error: {0}")]
    View(#[from] ViewError),
}

/// Application-wide runtime state.
///
/// Owns the delegation registry and the projection registry for one
/// document. Call `shutdown` when the application stops so that no
/// delegated native listeners outlive it.
#[derive(Debug)]
pub struct Runtime {
    config: RuntimeConfig,
    document: Node,
    events: Rc<EventManager>,
    projections: Rc<ProjectionProvider>,
    shut_down: Cell<bool>,
}

impl Default for Runtime {
    fn default() -> Self {
        Self::new(RuntimeConfig::default())
    }
}

impl Runtime {
    pub fn new(config: RuntimeConfig) -> Self {
        debug!("starting Orbit runtime {}", VERSION);
        Self {
            config,
            document: Node::document(),
            events: Rc::new(EventManager::new()),
            projections: Rc::new(ProjectionProvider::new()),
            shut_down: Cell::new(false),
        }
    }

    /// Start a runtime configured from a JSON file
    pub fn from_config_path(path: impl AsRef<Path>) -> Result<Self, Error> {
        Ok(Self::new(RuntimeConfig::from_path(path)?))
    }

    pub fn config(&self) -> &RuntimeConfig {
        &self.config
    }

    /// Root node that publishes delegated events
    pub fn document(&self) -> &Node {
        &self.document
    }

    pub fn events(&self) -> &Rc<EventManager> {
        &self.events
    }

    pub fn projections(&self) -> &Rc<ProjectionProvider> {
        &self.projections
    }

    pub fn is_shut_down(&self) -> bool {
        self.shut_down.get()
    }

    /// A direct subscriber for the events that signal a change of
    /// `property` on elements named `element`
    pub fn subscriber_for(&self, element: &str, property: &str) -> Option<EventSubscriber> {
        self.config
            .subscriber_config(element, property)
            .cloned()
            .map(EventSubscriber::new)
    }

    /// A view factory caching up to the configured number of views
    pub fn view_factory(
        &self,
        name: impl Into<String>,
        template: impl Template + 'static,
    ) -> ViewFactory {
        let factory = ViewFactory::new(name, template);
        factory.set_cache_size(self.config.view_cache_size, true);
        factory
    }

    /// A listener binding delegated through the document with the
    /// configured default strategy
    pub fn listener_binding(
        &self,
        target: &Node,
        event_name: impl Into<String>,
        handler: impl Fn(&Event, &Rc<Scope>) -> anyhow::Result<()> + 'static,
    ) -> ListenerBinding {
        ListenerBinding::new(
            &self.events,
            &self.document,
            target,
            event_name,
            self.config.default_strategy,
            handler,
        )
    }

    /// Detach every delegated listener and drop all projection
    /// registrations. Repeated calls do nothing.
    pub fn shutdown(&self) {
        if self.shut_down.replace(true) {
            return;
        }
        debug!("shutting down Orbit runtime");
        self.events.dispose();
        self.projections.clear();
    }
}
