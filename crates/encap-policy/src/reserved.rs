//! Reserved Property Keys
//!
//! The three string keys that reach prototype-related internal slots, and
//! the reflection operation each one maps to. The mapping is total and
//! fixed; nothing about it is configurable per object.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A string key that is special-cased by the property resolver
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ReservedKey {
    /// `__proto__`: the object's [[Prototype]]
    Proto,
    /// `prototype`: the prototype given to instances created by `new`
    Prototype,
    /// `constructor`: the back-reference from a prototype to its function
    Constructor,
}

/// The reflection equivalent of a reserved key
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ReflectionForm {
    /// `Object.getPrototypeOf` / `Object.setPrototypeOf`, or `Symbol.proto`
    PrototypeOf,
    /// `Symbol.instanceProto`
    InstanceProto,
    /// `Symbol.ctor`
    Ctor,
}

/// Property operation being intercepted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ReservedOp {
    Get,
    Set,
    Delete,
    Has,
    Define,
}

impl ReservedKey {
    /// All reserved keys, in a stable order
    pub const ALL: [ReservedKey; 3] = [
        ReservedKey::Proto,
        ReservedKey::Prototype,
        ReservedKey::Constructor,
    ];

    /// Classify a string key
    #[inline]
    pub fn from_key(key: &str) -> Option<Self> {
        match key {
            "__proto__" => Some(Self::Proto),
            "prototype" => Some(Self::Prototype),
            "constructor" => Some(Self::Constructor),
            _ => None,
        }
    }

    /// The string spelling of the key
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Proto => "__proto__",
            Self::Prototype => "prototype",
            Self::Constructor => "constructor",
        }
    }

    /// Reflection operation that reaches the same internal slot
    pub fn reflection(&self) -> ReflectionForm {
        match self {
            Self::Proto => ReflectionForm::PrototypeOf,
            Self::Prototype => ReflectionForm::InstanceProto,
            Self::Constructor => ReflectionForm::Ctor,
        }
    }
}

impl ReflectionForm {
    /// Name of the well-known symbol that grants access to the slot
    /// (the part after `Symbol.`)
    pub fn symbol_name(&self) -> &'static str {
        match self {
            Self::PrototypeOf => "proto",
            Self::InstanceProto => "instanceProto",
            Self::Ctor => "ctor",
        }
    }
}

impl fmt::Display for ReservedKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl fmt::Display for ReservedOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Get => "get",
            Self::Set => "set",
            Self::Delete => "delete",
            Self::Has => "has",
            Self::Define => "define",
        };
        f.write_str(name)
    }
}
