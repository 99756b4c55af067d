//! Mode Controller
//!
//! Holds the realm's encapsulation mode. The mode is resolved exactly once,
//! before the realm creates any object, and there is deliberately no setter:
//! every reader in a realm sees the same value for the realm's lifetime.

use crate::signal::{ModeSignal, SignalSource};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

/// Encapsulation mode of a realm
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RuntimeMode {
    /// Legacy semantics: reserved keys behave as they always have
    #[default]
    Disabled,
    /// Reserved string keys are inert; only reflection reaches the slots
    Enabled,
}

impl RuntimeMode {
    /// Is encapsulation active?
    #[inline]
    pub fn is_enabled(self) -> bool {
        matches!(self, RuntimeMode::Enabled)
    }
}

impl From<bool> for RuntimeMode {
    fn from(enabled: bool) -> Self {
        if enabled {
            RuntimeMode::Enabled
        } else {
            RuntimeMode::Disabled
        }
    }
}

/// Read-only view of a realm's mode
///
/// Constructed from an out-of-band [`ModeSignal`]. The controller is `Copy`
/// and is handed by value to the rewriter and the resolver.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ModeController {
    mode: RuntimeMode,
    source: SignalSource,
}

impl ModeController {
    /// Resolve the mode from an out-of-band signal
    ///
    /// A missing signal resolves to [`RuntimeMode::Disabled`].
    pub fn from_signal(signal: &ModeSignal) -> Self {
        let mode = RuntimeMode::from(signal.is_enabled());
        let source = signal.source();

        if signal.is_present() {
            info!("Encapsulation mode {:?} (source: {})", mode, source);
        } else {
            debug!("No encapsulation signal, defaulting to {:?}", mode);
        }

        Self { mode, source }
    }

    /// Controller with a fixed mode (embedders, tests)
    pub fn fixed(mode: RuntimeMode) -> Self {
        Self {
            mode,
            source: SignalSource::Embedder,
        }
    }

    /// Legacy controller
    pub fn disabled() -> Self {
        Self::fixed(RuntimeMode::Disabled)
    }

    /// Secure controller
    pub fn enabled() -> Self {
        Self::fixed(RuntimeMode::Enabled)
    }

    /// Is secure/encapsulation mode enabled for this realm?
    #[inline]
    pub fn is_secure_mode_enabled(&self) -> bool {
        self.mode.is_enabled()
    }

    /// The resolved mode
    #[inline]
    pub fn mode(&self) -> RuntimeMode {
        self.mode
    }

    /// Where the mode came from
    pub fn source(&self) -> SignalSource {
        self.source
    }
}

impl Default for ModeController {
    fn default() -> Self {
        Self::disabled()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_absent_signal_fails_open() {
        let controller = ModeController::from_signal(&ModeSignal::absent());

        assert!(!controller.is_secure_mode_enabled());
        assert_eq!(controller.source(), SignalSource::Absent);
    }

    #[test]
    fn test_header_signal_enables() {
        let signal = ModeSignal::from_header_value(Some("?1"));
        let controller = ModeController::from_signal(&signal);

        assert!(controller.is_secure_mode_enabled());
        assert_eq!(controller.mode(), RuntimeMode::Enabled);
        assert_eq!(controller.source(), SignalSource::Header);
    }

    #[test]
    fn test_controller_is_shareable() {
        fn assert_send_sync<T: Send + Sync + Copy>() {}
        assert_send_sync::<ModeController>();
    }

    #[test]
    fn test_mode_serde_spelling() {
        let json = serde_json::to_string(&RuntimeMode::Enabled).unwrap();
        assert_eq!(json, "\"enabled\"");
    }
}
