//! The `<au-slot>` placeholder element

use std::cell::RefCell;
use std::rc::Rc;

use async_trait::async_trait;

use crate::dom::Node;
use crate::scope::Scope;
use crate::slot::{ContentType, SlotInfo};
use crate::view::{LifecycleFlags, View, ViewComponent, ViewError, ViewFactory};

/// Renders projected or fallback content inside a component's template.
///
/// Projected content binds against the scope it was authored in; fallback
/// content binds against the scope of the view declaring the slot.
#[derive(Debug)]
pub struct AuSlot {
    name: String,
    view: View,
    outer_scope: Option<Rc<Scope>>,
    host_scope: RefCell<Option<Rc<Scope>>>,
}

impl AuSlot {
    /// Build the slot's view and place it inside `host`
    pub fn new(slot_info: &SlotInfo, host: &Node) -> Self {
        let factory = ViewFactory::for_slot(
            format!("au-slot:{}", slot_info.name),
            slot_info.projection_context.content.clone(),
            slot_info.content_type,
            slot_info.projection_context.scope.clone(),
        );
        let outer_scope = match slot_info.content_type {
            ContentType::Projection => factory.projection_scope().cloned(),
            ContentType::Fallback => None,
        };
        let view = factory.create();
        view.set_host(host);

        Self {
            name: slot_info.name.clone(),
            view,
            outer_scope,
            host_scope: RefCell::new(None),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn view(&self) -> &View {
        &self.view
    }

    pub fn content_type(&self) -> Option<ContentType> {
        self.view.content_type()
    }

    /// Scope captured where projected content was authored
    pub fn outer_scope(&self) -> Option<&Rc<Scope>> {
        self.outer_scope.as_ref()
    }

    /// Scope of the view declaring this slot, while active
    pub fn host_scope(&self) -> Option<Rc<Scope>> {
        self.host_scope.borrow().clone()
    }
}

#[async_trait(?Send)]
impl ViewComponent for AuSlot {
    async fn activate(
        &self,
        initiator: &View,
        parent: &View,
        flags: LifecycleFlags,
        host_scope: &Rc<Scope>,
    ) -> Result<(), ViewError> {
        self.host_scope.replace(Some(host_scope.clone()));
        let scope = self
            .outer_scope
            .clone()
            .unwrap_or_else(|| host_scope.clone());
        self.view
            .activate(
                Some(initiator),
                Some(parent),
                flags,
                Some(scope),
                Some(host_scope.clone()),
            )
            .await
    }

    async fn deactivate(
        &self,
        initiator: &View,
        parent: &View,
        flags: LifecycleFlags,
    ) -> Result<(), ViewError> {
        let result = self.view.deactivate(Some(initiator), Some(parent), flags).await;
        self.host_scope.replace(None);
        result
    }

    fn dispose(&self) {
        self.view.dispose();
    }
}
