//! Encap Runtime - Script Realm with Prototype Encapsulation
//!
//! A small tree-walking interpreter for the script language, built around
//! the property resolver that enforces encapsulation mode.
//!
//! # Key Features
//!
//! 1. **Property Resolver**: every get/set/define/delete/has goes through
//!    one table keyed on the property kind. Reserved string keys are legacy
//!    properties in a disabled realm and absent in an enabled one.
//!
//! 2. **Reflection API**: `Object.getPrototypeOf`/`setPrototypeOf`,
//!    `Reflect.*` and the well-known symbols `Symbol.proto`,
//!    `Symbol.instanceProto` and `Symbol.ctor` reach the internal slots in
//!    both modes.
//!
//! 3. **Realms**: each realm owns its heap and intrinsics and fixes its mode
//!    at creation. Units are parsed, scanned and rewritten before they run.
//!
//! # Resolution Table
//!
//! | Key | Disabled | Enabled |
//! |-----|----------|---------|
//! | `"__proto__"` | accessor on `Object.prototype` | absent, denied per policy |
//! | `"prototype"`, `"constructor"` | slot spelled as a property | absent, denied per policy |
//! | well-known symbol | slot | slot |
//! | anything else | ordinary | ordinary |

mod builtins;
mod error;
mod heap;
mod interpreter;
mod json;
mod object;
mod realm;
mod reflection;
mod resolver;
mod scope;
mod value;

pub use builtins::Intrinsics;
pub use error::RuntimeError;
pub use heap::{Heap, HeapError, HeapLimits, HeapStats};
pub use interpreter::Interpreter;
pub use json::{parse as json_parse, stringify as json_stringify};
pub use object::{Callable, NativeFn, ObjectData, ObjectKind, Property, Slot};
pub use realm::{CompiledScript, Realm, RealmDiagnostic, RealmError, RealmState};
pub use reflection::WellKnownSymbols;
pub use resolver::{PolicyDenial, PropertyResolver};
pub use value::{ObjectId, PropertyKey, SymbolId, Value};
