//! Variable scopes for runtime check evaluation
//!
//! The root scope holds the function arguments (and `result`). Each
//! iteration construct opens a child scope for its loop variable, which
//! shadows any outer binding of the same name.

use super::Value;
use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

/// Shared handle on a scope
pub type EnvRef = Rc<RefCell<Environment>>;

/// One scope of bindings with an optional enclosing scope
#[derive(Debug, Clone, Default)]
pub struct Environment {
    values: HashMap<String, Value>,
    enclosing: Option<EnvRef>,
}

impl Environment {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_parent(parent: EnvRef) -> Self {
        Self {
            values: HashMap::new(),
            enclosing: Some(parent),
        }
    }

    pub fn into_ref(self) -> EnvRef {
        Rc::new(RefCell::new(self))
    }

    /// Bind or rebind `name` in this scope
    pub fn define(&mut self, name: impl Into<String>, value: Value) {
        self.values.insert(name.into(), value);
    }

    /// Innermost binding of `name`
    pub fn get(&self, name: &str) -> Option<Value> {
        self.values
            .get(name)
            .cloned()
            .or_else(|| self.enclosing.as_ref().and_then(|outer| outer.borrow().get(name)))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.values.contains_key(name)
            || self
                .enclosing
                .as_ref()
                .is_some_and(|outer| outer.borrow().contains(name))
    }
}

/// Open a scope nested in `parent`
pub fn child_env(parent: &EnvRef) -> EnvRef {
    Environment::with_parent(Rc::clone(parent)).into_ref()
}
