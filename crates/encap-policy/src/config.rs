//! Realm Configuration
//!
//! Configuration for a realm: the denial policy applied to reserved-key
//! accesses in secure mode, an optional config-file mode signal, and the
//! interpreter's resource limits.

use crate::signal::{ModeSignal, SignalSource};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// What a denied reserved-key access does in secure mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DenialPolicy {
    /// Get yields `undefined`; set, define and delete are no-ops
    #[default]
    Silent,
    /// Every denied access throws a policy violation
    Throw,
}

/// Interpreter resource limits
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuntimeLimits {
    /// Maximum number of live objects in a realm
    pub max_objects: usize,
    /// Maximum evaluation steps per script
    pub max_steps: u64,
    /// Maximum call depth
    pub max_call_depth: usize,
    /// Bytes of array storage and string data a realm may allocate
    #[serde(default = "default_max_bytes")]
    pub max_bytes: usize,
}

/// Smallest byte budget that still fits the intrinsics
pub const MIN_BYTE_BUDGET: usize = 64 * 1024;

fn default_max_bytes() -> usize {
    RuntimeLimits::standard().max_bytes
}

impl RuntimeLimits {
    /// Small limits for sandboxed snippets
    pub fn sandbox() -> Self {
        Self {
            max_objects: 16 * 1024,
            max_steps: 1_000_000,
            max_call_depth: 128,
            max_bytes: 16 * 1024 * 1024,
        }
    }

    /// Limits for ordinary scripts
    pub fn standard() -> Self {
        Self {
            max_objects: 1024 * 1024,
            max_steps: 100_000_000,
            max_call_depth: 512,
            max_bytes: 256 * 1024 * 1024,
        }
    }
}

impl Default for RuntimeLimits {
    fn default() -> Self {
        Self::standard()
    }
}

/// Complete realm configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncapConfig {
    /// Mode from the config file, consulted after header/flag/env signals
    #[serde(default)]
    pub secure_mode: Option<bool>,

    /// Behaviour of denied accesses
    #[serde(default)]
    pub denial_policy: DenialPolicy,

    /// Warn when a script asks for encapsulation the realm does not provide
    #[serde(default = "default_true")]
    pub report_mode_mismatch: bool,

    /// Resource limits
    #[serde(default)]
    pub limits: RuntimeLimits,
}

fn default_true() -> bool {
    true
}

impl Default for EncapConfig {
    fn default() -> Self {
        Self::compatible()
    }
}

impl EncapConfig {
    /// Fail-open configuration: mode comes only from signals, denials are silent
    pub fn compatible() -> Self {
        Self {
            secure_mode: None,
            denial_policy: DenialPolicy::Silent,
            report_mode_mismatch: true,
            limits: RuntimeLimits::standard(),
        }
    }

    /// Strict configuration: secure by config, denials throw
    pub fn strict() -> Self {
        Self {
            secure_mode: Some(true),
            denial_policy: DenialPolicy::Throw,
            report_mode_mismatch: true,
            limits: RuntimeLimits::sandbox(),
        }
    }

    /// Mode signal carried by this configuration
    pub fn mode_signal(&self) -> ModeSignal {
        match self.secure_mode {
            Some(enabled) => ModeSignal::new(enabled, SignalSource::Config),
            None => ModeSignal::absent(),
        }
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.limits.max_objects < 256 {
            return Err(ConfigError::HeapTooSmall);
        }
        if self.limits.max_steps == 0 {
            return Err(ConfigError::NoStepBudget);
        }
        if self.limits.max_call_depth == 0 {
            return Err(ConfigError::NoCallDepth);
        }
        if self.limits.max_bytes < MIN_BYTE_BUDGET {
            return Err(ConfigError::ByteBudgetTooSmall);
        }
        Ok(())
    }

    /// Load from TOML file
    pub fn from_toml_file(path: &Path) -> Result<Self, ConfigError> {
        let content =
            std::fs::read_to_string(path).map_err(|e| ConfigError::Io(e.to_string()))?;
        Self::from_toml(&content)
    }

    /// Load from TOML string
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: Self =
            toml::from_str(content).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Load from JSON string
    pub fn from_json(content: &str) -> Result<Self, ConfigError> {
        let config: Self =
            serde_json::from_str(content).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }
}

/// Configuration errors
#[derive(Debug, Clone, thiserror::Error)]
pub enum ConfigError {
    #[error("Object limit too small (minimum 256 for intrinsics)")]
    HeapTooSmall,

    #[error("Step budget must be non-zero")]
    NoStepBudget,

    #[error("Call depth limit must be non-zero")]
    NoCallDepth,

    #[error("Byte budget too small (minimum 64 KiB)")]
    ByteBudgetTooSmall,

    #[error("Config IO error: {0}")]
    Io(String),

    #[error("Config parse error: {0}")]
    Parse(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_presets_validate() {
        assert!(EncapConfig::compatible().validate().is_ok());
        assert!(EncapConfig::strict().validate().is_ok());
        assert_eq!(EncapConfig::default().denial_policy, DenialPolicy::Silent);
    }

    #[test]
    fn test_config_validation() {
        let mut config = EncapConfig::compatible();
        config.limits.max_objects = 10;

        assert!(matches!(config.validate(), Err(ConfigError::HeapTooSmall)));
    }

    #[test]
    fn test_from_toml() {
        let config = EncapConfig::from_toml(
            r#"
            secure_mode = true
            denial_policy = "throw"

            [limits]
            max_objects = 4096
            max_steps = 5000
            max_call_depth = 32
            "#,
        )
        .unwrap();

        assert_eq!(config.denial_policy, DenialPolicy::Throw);
        assert!(config.report_mode_mismatch);
        assert!(config.mode_signal().is_enabled());
        assert_eq!(config.mode_signal().source(), SignalSource::Config);
        assert_eq!(config.limits.max_steps, 5000);
        assert_eq!(config.limits.max_bytes, RuntimeLimits::standard().max_bytes);
    }

    #[test]
    fn test_byte_budget() {
        let config = EncapConfig::from_toml(
            r#"
            [limits]
            max_objects = 4096
            max_steps = 5000
            max_call_depth = 32
            max_bytes = 1048576
            "#,
        )
        .unwrap();
        assert_eq!(config.limits.max_bytes, 1024 * 1024);

        let mut config = EncapConfig::compatible();
        config.limits.max_bytes = 1024;
        assert!(matches!(config.validate(), Err(ConfigError::ByteBudgetTooSmall)));
    }

    #[test]
    fn test_from_json_defaults() {
        let config = EncapConfig::from_json("{}").unwrap();

        assert_eq!(config, EncapConfig::compatible());
        assert!(!config.mode_signal().is_present());
    }

    #[test]
    fn test_invalid_toml() {
        assert!(matches!(
            EncapConfig::from_toml("denial_policy = \"explode\""),
            Err(ConfigError::Parse(_))
        ));
    }
}
