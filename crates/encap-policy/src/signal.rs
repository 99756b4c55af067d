//! Out-of-Band Mode Signal
//!
//! Encapsulation mode is never switched from inside the language. It comes
//! from the environment that hosts the realm:
//!
//! | Host | Signal | Example |
//! |------|--------|---------|
//! | Network-hosted | Response header | `Prototype-Encapsulation: ?1` |
//! | Standalone | Launch flag | `--secure-mode` / `--secure-mode=false` |
//! | Standalone | Environment | `ENCAP_SECURE_MODE=1` |
//!
//! Recognised values are structured-field booleans (`?1` / `?0`) and the
//! usual spellings (`1`, `true`, `on`, `enabled` and their negatives).
//! An absent signal, or a value that cannot be parsed, leaves the mode
//! disabled.

use hyper::HeaderMap;
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::{trace, warn};

/// Response header carrying the signal
pub const HEADER_NAME: &str = "prototype-encapsulation";

/// Process launch flag carrying the signal
pub const LAUNCH_FLAG: &str = "--secure-mode";

/// Environment variable carrying the signal
pub const ENV_VAR: &str = "ENCAP_SECURE_MODE";

/// Where a signal was read from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SignalSource {
    /// HTTP response header
    Header,
    /// Process launch flag
    LaunchFlag,
    /// Environment variable
    Environment,
    /// Configuration file
    Config,
    /// Set directly by the embedding application
    Embedder,
    /// No signal at all
    Absent,
}

impl fmt::Display for SignalSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Header => "header",
            Self::LaunchFlag => "launch flag",
            Self::Environment => "environment",
            Self::Config => "config",
            Self::Embedder => "embedder",
            Self::Absent => "absent",
        };
        f.write_str(name)
    }
}

/// Signal parsing errors
#[derive(Debug, Clone, thiserror::Error)]
pub enum SignalError {
    #[error("Unrecognised encapsulation signal value: {0:?}")]
    UnrecognisedValue(String),
}

/// A single out-of-band boolean
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ModeSignal {
    value: Option<bool>,
    source: SignalSource,
}

impl ModeSignal {
    /// No signal
    pub fn absent() -> Self {
        Self {
            value: None,
            source: SignalSource::Absent,
        }
    }

    /// Signal with an explicit value
    pub fn new(enabled: bool, source: SignalSource) -> Self {
        Self {
            value: Some(enabled),
            source,
        }
    }

    /// Parse a raw header value (`None` when the header is missing)
    pub fn from_header_value(value: Option<&str>) -> Self {
        Self::from_raw(value, SignalSource::Header)
    }

    /// Read the signal from response headers
    pub fn from_headers(headers: &HeaderMap) -> Self {
        let value = headers
            .get(HEADER_NAME)
            .and_then(|v| v.to_str().ok());
        Self::from_header_value(value)
    }

    /// Read the signal from process arguments
    ///
    /// `--secure-mode` alone means enabled; `--secure-mode=<value>` is
    /// parsed like a header value. The last occurrence wins.
    pub fn from_args<I, S>(args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut signal = Self::absent();
        for arg in args {
            let arg = arg.as_ref();
            if arg == LAUNCH_FLAG {
                signal = Self::new(true, SignalSource::LaunchFlag);
            } else if let Some(value) = arg
                .strip_prefix(LAUNCH_FLAG)
                .and_then(|rest| rest.strip_prefix('='))
            {
                signal = Self::from_raw(Some(value), SignalSource::LaunchFlag);
            }
        }
        signal
    }

    /// Parse an environment variable value
    pub fn from_env_value(value: Option<&str>) -> Self {
        Self::from_raw(value, SignalSource::Environment)
    }

    /// Read [`ENV_VAR`] from the process environment
    pub fn from_env() -> Self {
        let value = std::env::var(ENV_VAR).ok();
        Self::from_env_value(value.as_deref())
    }

    /// First signal that is present, in the given precedence order
    pub fn first_present<I>(signals: I) -> Self
    where
        I: IntoIterator<Item = ModeSignal>,
    {
        signals
            .into_iter()
            .find(ModeSignal::is_present)
            .unwrap_or_else(Self::absent)
    }

    fn from_raw(value: Option<&str>, source: SignalSource) -> Self {
        let Some(raw) = value else {
            return Self::absent();
        };

        match parse_flag_value(raw) {
            Ok(enabled) => {
                trace!("Encapsulation signal from {}: {}", source, enabled);
                Self::new(enabled, source)
            }
            Err(e) => {
                warn!("{} (source: {}), treating as absent", e, source);
                Self::absent()
            }
        }
    }

    /// Was any signal received?
    pub fn is_present(&self) -> bool {
        self.value.is_some()
    }

    /// Does the signal request encapsulation?
    pub fn is_enabled(&self) -> bool {
        self.value.unwrap_or(false)
    }

    /// Where the signal came from
    pub fn source(&self) -> SignalSource {
        self.source
    }
}

impl Default for ModeSignal {
    fn default() -> Self {
        Self::absent()
    }
}

/// Parse a boolean signal value
pub fn parse_flag_value(raw: &str) -> Result<bool, SignalError> {
    let value = raw.trim();
    match value.to_ascii_lowercase().as_str() {
        "?1" | "1" | "true" | "on" | "yes" | "enabled" => Ok(true),
        "?0" | "0" | "false" | "off" | "no" | "disabled" => Ok(false),
        _ => Err(SignalError::UnrecognisedValue(value.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hyper::header::HeaderValue;

    #[test]
    fn test_header_values() {
        assert!(ModeSignal::from_header_value(Some("?1")).is_enabled());
        assert!(ModeSignal::from_header_value(Some(" true ")).is_enabled());
        assert!(!ModeSignal::from_header_value(Some("?0")).is_enabled());
        assert!(ModeSignal::from_header_value(Some("?0")).is_present());
        assert!(!ModeSignal::from_header_value(None).is_present());
    }

    #[test]
    fn test_unrecognised_value_is_absent() {
        let signal = ModeSignal::from_header_value(Some("maybe"));

        assert!(!signal.is_present());
        assert!(!signal.is_enabled());
        assert!(parse_flag_value("maybe").is_err());
    }

    #[test]
    fn test_header_map() {
        let mut headers = HeaderMap::new();
        assert!(!ModeSignal::from_headers(&headers).is_present());

        headers.insert(HEADER_NAME, HeaderValue::from_static("?1"));
        let signal = ModeSignal::from_headers(&headers);
        assert!(signal.is_enabled());
        assert_eq!(signal.source(), SignalSource::Header);
    }

    #[test]
    fn test_launch_flags() {
        let signal = ModeSignal::from_args(["encap", "run", "--secure-mode", "app.js"]);
        assert!(signal.is_enabled());
        assert_eq!(signal.source(), SignalSource::LaunchFlag);

        let signal = ModeSignal::from_args(["encap", "--secure-mode=off"]);
        assert!(signal.is_present());
        assert!(!signal.is_enabled());

        let signal = ModeSignal::from_args(["encap", "--secure-modex"]);
        assert!(!signal.is_present());
    }

    #[test]
    fn test_precedence() {
        let signal = ModeSignal::first_present([
            ModeSignal::from_args(["encap"]),
            ModeSignal::from_env_value(Some("1")),
            ModeSignal::from_header_value(Some("?0")),
        ]);

        assert!(signal.is_enabled());
        assert_eq!(signal.source(), SignalSource::Environment);
        assert!(!ModeSignal::first_present([]).is_present());
    }
}
