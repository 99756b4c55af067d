//! Object Model
//!
//! Every object has a [[Prototype]] link, an ordered map of own properties
//! and two internal slots:
//!
//! | Slot | Legacy spelling | Reflection spelling |
//! |------|-----------------|---------------------|
//! | `proto` | `o.__proto__` | `Object.getPrototypeOf(o)`, `o[Symbol.proto]` |
//! | `instance_proto` | `F.prototype` | `F[Symbol.instanceProto]` |
//! | `ctor` | `P.constructor` | `P[Symbol.ctor]` |
//!
//! The reserved string keys never live in the property map; they are
//! routed to the slots by the property resolver. The one exception is an
//! own data property literally named `__proto__`, which legacy realms
//! create for `JSON.parse` output and computed literal keys.

use crate::error::RuntimeError;
use crate::interpreter::Interpreter;
use crate::scope::ScopeRef;
use crate::value::{ObjectId, PropertyKey, Value};
use encap_syntax::FunctionDef;
use indexmap::IndexMap;
use std::rc::Rc;

/// Native function: `(interpreter, this, arguments)`
pub type NativeFn = fn(&mut Interpreter, &Value, &[Value]) -> Result<Value, RuntimeError>;

/// An own data property
#[derive(Debug, Clone)]
pub struct Property {
    pub value: Value,
    pub enumerable: bool,
    /// Cleared for fixed built-ins, which also cannot be redefined or
    /// deleted
    pub writable: bool,
}

impl Property {
    pub fn enumerable(value: Value) -> Self {
        Self {
            value,
            enumerable: true,
            writable: true,
        }
    }

    pub fn hidden(value: Value) -> Self {
        Self {
            value,
            enumerable: false,
            writable: true,
        }
    }

    /// Non-enumerable and read-only
    pub fn fixed(value: Value) -> Self {
        Self {
            value,
            enumerable: false,
            writable: false,
        }
    }
}

/// `instance_proto` and `ctor` slot contents
#[derive(Debug, Clone)]
pub struct Slot {
    pub value: Value,
    /// Listed by legacy key enumeration under its string spelling
    pub enumerable: bool,
}

/// Something that can be called
#[derive(Clone)]
pub enum Callable {
    Script {
        def: Rc<FunctionDef>,
        scope: ScopeRef,
    },
    Native {
        name: &'static str,
        func: NativeFn,
        /// May be used with `new`
        constructor: bool,
    },
}

impl std::fmt::Debug for Callable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Callable::Script { def, .. } => {
                write!(f, "Script({})", def.name.as_deref().unwrap_or("anonymous"))
            }
            Callable::Native { name, .. } => write!(f, "Native({})", name),
        }
    }
}

impl Callable {
    pub fn name(&self) -> &str {
        match self {
            Callable::Script { def, .. } => def.name.as_deref().unwrap_or(""),
            Callable::Native { name, .. } => name,
        }
    }

    pub fn is_constructor(&self) -> bool {
        match self {
            Callable::Script { .. } => true,
            Callable::Native { constructor, .. } => *constructor,
        }
    }
}

/// Exotic behaviour of an object
#[derive(Debug, Clone)]
pub enum ObjectKind {
    Ordinary,
    /// Dense array; elements are addressed by canonical index keys
    Array(Vec<Value>),
    Function(Callable),
    /// Instance of one of the error constructors
    Error,
}

/// A heap object
#[derive(Debug, Clone)]
pub struct ObjectData {
    /// [[Prototype]]
    pub proto: Option<ObjectId>,
    pub properties: IndexMap<PropertyKey, Property>,
    pub instance_proto: Option<Slot>,
    pub ctor: Option<Slot>,
    pub kind: ObjectKind,
}

impl ObjectData {
    pub fn new(proto: Option<ObjectId>, kind: ObjectKind) -> Self {
        Self {
            proto,
            properties: IndexMap::new(),
            instance_proto: None,
            ctor: None,
            kind,
        }
    }

    pub fn ordinary(proto: Option<ObjectId>) -> Self {
        Self::new(proto, ObjectKind::Ordinary)
    }

    pub fn callable(&self) -> Option<&Callable> {
        match &self.kind {
            ObjectKind::Function(callable) => Some(callable),
            _ => None,
        }
    }

    pub fn is_array(&self) -> bool {
        matches!(self.kind, ObjectKind::Array(_))
    }

    pub fn elements(&self) -> Option<&Vec<Value>> {
        match &self.kind {
            ObjectKind::Array(elements) => Some(elements),
            _ => None,
        }
    }

    pub fn elements_mut(&mut self) -> Option<&mut Vec<Value>> {
        match &mut self.kind {
            ObjectKind::Array(elements) => Some(elements),
            _ => None,
        }
    }

    /// Own property lookup, including array elements and `length`
    pub fn own_property(&self, key: &PropertyKey) -> Option<Value> {
        if let ObjectKind::Array(elements) = &self.kind {
            if let Some(index) = key.array_index() {
                return elements.get(index).cloned();
            }
            if key.as_str() == Some("length") {
                return Some(Value::Number(elements.len() as f64));
            }
        }
        self.properties.get(key).map(|p| p.value.clone())
    }

    pub fn has_own_property(&self, key: &PropertyKey) -> bool {
        if let ObjectKind::Array(elements) = &self.kind {
            if let Some(index) = key.array_index() {
                return index < elements.len();
            }
            if key.as_str() == Some("length") {
                return true;
            }
        }
        self.properties.contains_key(key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_array_own_properties() {
        let mut data = ObjectData::new(None, ObjectKind::Array(vec![Value::Number(1.0)]));
        data.properties
            .insert(PropertyKey::string("extra"), Property::enumerable(Value::Null));

        assert_eq!(data.own_property(&"0".into()), Some(Value::Number(1.0)));
        assert_eq!(data.own_property(&"length".into()), Some(Value::Number(1.0)));
        assert_eq!(data.own_property(&"extra".into()), Some(Value::Null));
        assert!(data.has_own_property(&"length".into()));
        assert!(!data.has_own_property(&"1".into()));
    }

    #[test]
    fn test_reserved_keys_are_not_properties() {
        let mut data = ObjectData::ordinary(None);
        data.ctor = Some(Slot {
            value: Value::Null,
            enumerable: false,
        });
        assert!(!data.has_own_property(&"constructor".into()));
    }
}
