//! Renders a view under a child scope derived from a value

use std::cell::RefCell;
use std::rc::Rc;

use async_trait::async_trait;
use serde_json::Value;

use crate::scope::Scope;
use crate::view::{LifecycleFlags, View, ViewComponent, ViewError, ViewFactory};

/// Component that binds its content to a child scope whose binding context
/// is `value`, with the declaring view's scope as parent
#[derive(Debug)]
pub struct With {
    view: View,
    value: RefCell<Value>,
}

impl With {
    pub fn new(factory: &ViewFactory, value: Value) -> Self {
        Self {
            view: factory.create(),
            value: RefCell::new(value),
        }
    }

    pub fn view(&self) -> &View {
        &self.view
    }

    /// Value used for the next activation
    pub fn set_value(&self, value: Value) {
        self.value.replace(value);
    }
}

#[async_trait(?Send)]
impl ViewComponent for With {
    async fn activate(
        &self,
        initiator: &View,
        parent: &View,
        flags: LifecycleFlags,
        host_scope: &Rc<Scope>,
    ) -> Result<(), ViewError> {
        let child = Scope::from_parent(host_scope, self.value.borrow().clone());
        self.view
            .activate(Some(initiator), Some(parent), flags, Some(child), Some(host_scope.clone()))
            .await
    }

    async fn deactivate(
        &self,
        initiator: &View,
        parent: &View,
        flags: LifecycleFlags,
    ) -> Result<(), ViewError> {
        self.view.deactivate(Some(initiator), Some(parent), flags).await
    }

    fn dispose(&self) {
        self.view.dispose();
    }
}
