//! Runtime errors
//!
//! Script-level errors (`Type`, `Reference`, `PolicyViolation`, ...) can be
//! caught by `try`/`catch` and are materialised as error objects there.
//! Resource exhaustion is never catchable and unwinds to the embedder.

use crate::heap::HeapError;
use crate::value::Value;
use encap_policy::{ReservedKey, ReservedOp};
use encap_syntax::ParseError;

/// Errors raised while evaluating a script
#[derive(Debug, Clone, thiserror::Error)]
pub enum RuntimeError {
    #[error(transparent)]
    Syntax(#[from] ParseError),

    /// A value thrown by `throw`, or an error object re-thrown
    #[error("Uncaught exception")]
    Thrown(Value),

    #[error("TypeError: {0}")]
    Type(String),

    #[error("ReferenceError: {0} is not defined")]
    Reference(String),

    #[error("RangeError: {0}")]
    Range(String),

    /// Malformed input to `JSON.parse`
    #[error("SyntaxError: {0}")]
    Json(String),

    /// Reserved-key access denied under the throwing policy
    #[error("PolicyViolation: '{key}' is not accessible in encapsulation mode ({op})")]
    PolicyViolation { key: ReservedKey, op: ReservedOp },

    #[error("Out of memory: object limit of {limit} reached")]
    OutOfMemory { limit: usize },

    #[error("Out of memory: byte budget of {limit} exhausted")]
    ByteLimit { limit: usize },

    #[error("Step budget of {limit} exhausted")]
    StepLimit { limit: u64 },

    #[error("Maximum call depth of {limit} exceeded")]
    CallDepth { limit: usize },

    /// The realm was poisoned by an earlier resource failure
    #[error("Realm is faulted")]
    Faulted,
}

impl RuntimeError {
    pub fn type_error(message: impl Into<String>) -> Self {
        RuntimeError::Type(message.into())
    }

    /// Can script code observe this error through `catch`?
    pub fn is_catchable(&self) -> bool {
        !self.is_resource_limit() && !matches!(self, RuntimeError::Faulted)
    }

    /// Did evaluation stop because a realm limit was hit?
    pub fn is_resource_limit(&self) -> bool {
        matches!(
            self,
            RuntimeError::OutOfMemory { .. }
                | RuntimeError::ByteLimit { .. }
                | RuntimeError::StepLimit { .. }
                | RuntimeError::CallDepth { .. }
        )
    }

    /// Name of the error constructor a caught error is an instance of
    pub fn error_name(&self) -> &'static str {
        match self {
            RuntimeError::Syntax(_) | RuntimeError::Json(_) => "SyntaxError",
            RuntimeError::Reference(_) => "ReferenceError",
            RuntimeError::Range(_) => "RangeError",
            RuntimeError::Type(_) | RuntimeError::PolicyViolation { .. } => "TypeError",
            _ => "Error",
        }
    }

    /// Message without the constructor-name prefix
    pub fn message(&self) -> String {
        match self {
            RuntimeError::Syntax(e) => e.kind.to_string(),
            RuntimeError::Type(m) | RuntimeError::Range(m) | RuntimeError::Json(m) => m.clone(),
            RuntimeError::Reference(name) => format!("{} is not defined", name),
            RuntimeError::PolicyViolation { key, op } => {
                format!("'{}' is not accessible in encapsulation mode ({})", key, op)
            }
            other => other.to_string(),
        }
    }
}

impl From<HeapError> for RuntimeError {
    fn from(e: HeapError) -> Self {
        match e {
            HeapError::OutOfMemory { limit } => RuntimeError::OutOfMemory { limit },
            HeapError::ByteLimit { limit } => RuntimeError::ByteLimit { limit },
        }
    }
}
