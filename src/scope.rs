//! Binding scopes
//!
//! A scope is a chain of binding contexts. Views bind against a scope;
//! components derive child scopes from the scope they are declared in, and
//! projected content keeps the scope it was authored in.

use std::cell::RefCell;
use std::rc::Rc;

use serde_json::{Map, Value};

/// Key under which non-object binding contexts are stored
pub const THIS_KEY: &str = "$this";

/// A link in the scope chain
#[derive(Debug)]
pub struct Scope {
    parent: Option<Rc<Scope>>,
    binding_context: RefCell<Map<String, Value>>,
    override_context: RefCell<Map<String, Value>>,
    is_boundary: bool,
}

fn into_context(value: Value) -> Map<String, Value> {
    match value {
        Value::Object(map) => map,
        Value::Null => Map::new(),
        other => {
            let mut map = Map::new();
            map.insert(THIS_KEY.to_owned(), other);
            map
        }
    }
}

impl Scope {
    /// Create a root scope.
    ///
    /// A boundary scope ends name lookup: parents of a boundary are never
    /// consulted by lookups starting below it.
    pub fn create(binding_context: Value, is_boundary: bool) -> Rc<Self> {
        Rc::new(Self {
            parent: None,
            binding_context: RefCell::new(into_context(binding_context)),
            override_context: RefCell::new(Map::new()),
            is_boundary,
        })
    }

    /// Derive a child scope
    pub fn from_parent(parent: &Rc<Scope>, binding_context: Value) -> Rc<Self> {
        Rc::new(Self {
            parent: Some(parent.clone()),
            binding_context: RefCell::new(into_context(binding_context)),
            override_context: RefCell::new(Map::new()),
            is_boundary: false,
        })
    }

    pub fn parent(&self) -> Option<&Rc<Scope>> {
        self.parent.as_ref()
    }

    pub fn is_boundary(&self) -> bool {
        self.is_boundary
    }

    /// Look up `name`, checking override contexts before binding contexts
    /// and walking up until a boundary
    pub fn get(&self, name: &str) -> Option<Value> {
        let mut current = Some(self);
        while let Some(scope) = current {
            if let Some(value) = scope.own(name) {
                return Some(value);
            }
            if scope.is_boundary {
                break;
            }
            current = scope.parent.as_deref();
        }
        None
    }

    fn own(&self, name: &str) -> Option<Value> {
        if let Some(value) = self.override_context.borrow().get(name) {
            return Some(value.clone());
        }
        self.binding_context.borrow().get(name).cloned()
    }

    /// Look up a dotted path such as `user.name`
    pub fn get_path(&self, path: &str) -> Option<Value> {
        let mut segments = path.split('.');
        let mut value = self.get(segments.next()?)?;
        for segment in segments {
            value = match value {
                Value::Object(mut map) => map.remove(segment)?,
                Value::Array(mut items) => {
                    let index: usize = segment.parse().ok()?;
                    if index >= items.len() {
                        return None;
                    }
                    items.swap_remove(index)
                }
                _ => return None,
            };
        }
        Some(value)
    }

    /// Set a value in this scope's binding context
    pub fn set(&self, name: impl Into<String>, value: Value) {
        self.binding_context.borrow_mut().insert(name.into(), value);
    }

    /// Set a value in this scope's override context
    pub fn set_override(&self, name: impl Into<String>, value: Value) {
        self.override_context.borrow_mut().insert(name.into(), value);
    }

    /// A copy of this scope's binding context
    pub fn binding_context(&self) -> Value {
        Value::Object(self.binding_context.borrow().clone())
    }
}
