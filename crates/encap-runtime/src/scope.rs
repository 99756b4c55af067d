//! Lexical scopes

use crate::error::RuntimeError;
use crate::value::Value;
use rustc_hash::FxHashMap;
use std::cell::RefCell;
use std::rc::Rc;

pub type ScopeRef = Rc<RefCell<Scope>>;

#[derive(Debug, Clone)]
pub struct Binding {
    pub value: Value,
    pub mutable: bool,
}

/// One level of the scope chain
#[derive(Debug, Default)]
pub struct Scope {
    bindings: FxHashMap<String, Binding>,
    parent: Option<ScopeRef>,
    /// `this` of a function scope; `None` for block scopes
    this: Option<Value>,
}

impl Scope {
    /// Top-level scope of a realm
    pub fn global() -> ScopeRef {
        Rc::new(RefCell::new(Scope {
            this: Some(Value::Undefined),
            ..Default::default()
        }))
    }

    /// Block scope
    pub fn block(parent: &ScopeRef) -> ScopeRef {
        Rc::new(RefCell::new(Scope {
            parent: Some(parent.clone()),
            ..Default::default()
        }))
    }

    /// Function activation scope
    pub fn function(parent: &ScopeRef, this: Value) -> ScopeRef {
        Rc::new(RefCell::new(Scope {
            parent: Some(parent.clone()),
            this: Some(this),
            ..Default::default()
        }))
    }

    pub fn declare(scope: &ScopeRef, name: &str, value: Value, mutable: bool) {
        scope
            .borrow_mut()
            .bindings
            .insert(name.to_string(), Binding { value, mutable });
    }

    /// Declare a `var` binding unless one already exists in this scope
    pub fn declare_var(scope: &ScopeRef, name: &str) {
        scope
            .borrow_mut()
            .bindings
            .entry(name.to_string())
            .or_insert(Binding {
                value: Value::Undefined,
                mutable: true,
            });
    }

    pub fn lookup(scope: &ScopeRef, name: &str) -> Option<Value> {
        let mut current = Some(scope.clone());
        while let Some(s) = current {
            let s = s.borrow();
            if let Some(binding) = s.bindings.get(name) {
                return Some(binding.value.clone());
            }
            current = s.parent.clone();
        }
        None
    }

    /// Assign to an existing binding
    pub fn assign(scope: &ScopeRef, name: &str, value: Value) -> Result<(), RuntimeError> {
        let mut current = Some(scope.clone());
        while let Some(s) = current {
            let mut s = s.borrow_mut();
            if let Some(binding) = s.bindings.get_mut(name) {
                if !binding.mutable {
                    return Err(RuntimeError::type_error("Assignment to constant variable."));
                }
                binding.value = value;
                return Ok(());
            }
            current = s.parent.clone();
        }
        Err(RuntimeError::Reference(name.to_string()))
    }

    /// `this` of the nearest function scope
    pub fn this_value(scope: &ScopeRef) -> Value {
        let mut current = Some(scope.clone());
        while let Some(s) = current {
            let s = s.borrow();
            if let Some(this) = &s.this {
                return this.clone();
            }
            current = s.parent.clone();
        }
        Value::Undefined
    }
}
