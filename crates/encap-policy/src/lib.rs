//! Encap Policy - Prototype Encapsulation Mode
//!
//! The realm-level policy shared by the parser and the runtime:
//!
//! 1. **Runtime mode**: whether secure/encapsulation mode is active for a
//!    realm. Resolved once from an out-of-band signal (HTTP header, launch
//!    flag, environment) and immutable afterwards.
//!
//! 2. **Reserved keys**: `__proto__`, `prototype` and `constructor`, each
//!    with a fixed reflection equivalent.
//!
//! 3. **Denial policy**: what a denied reserved-key access does when the
//!    mode is enabled (silently "not found", or a thrown error).
//!
//! # Mode Matrix
//!
//! | Mode | Static `o.__proto__` | Computed `o[k]` with reserved `k` | Reflection API |
//! |------|----------------------|-----------------------------------|----------------|
//! | Disabled | legacy | legacy | works |
//! | Enabled | rewritten at parse time | denied per policy | works |

mod config;
mod mode;
mod reserved;
mod signal;

pub use config::{ConfigError, DenialPolicy, EncapConfig, RuntimeLimits, MIN_BYTE_BUDGET};
pub use mode::{ModeController, RuntimeMode};
pub use reserved::{ReflectionForm, ReservedKey, ReservedOp};
pub use signal::{
    parse_flag_value, ModeSignal, SignalError, SignalSource, ENV_VAR, HEADER_NAME, LAUNCH_FLAG,
};
