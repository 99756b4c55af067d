//! Subcommands and the options they share

pub mod check;
pub mod rewrite;
pub mod run;

use anyhow::{anyhow, Context, Result};
use clap::{Args, ValueEnum};
use encap_policy::{DenialPolicy, EncapConfig, ModeSignal, RuntimeLimits, LAUNCH_FLAG};
use std::path::{Path, PathBuf};

/// Realms recurse on the native stack; give them room for deep call chains
const REALM_STACK_SIZE: usize = 64 * 1024 * 1024;

/// Denial policy on the command line
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum PolicyArg {
    /// Denied accesses read as undefined and writes are dropped
    Silent,
    /// Denied accesses throw
    Throw,
}

impl From<PolicyArg> for DenialPolicy {
    fn from(arg: PolicyArg) -> Self {
        match arg {
            PolicyArg::Silent => DenialPolicy::Silent,
            PolicyArg::Throw => DenialPolicy::Throw,
        }
    }
}

/// How to build the realm a script runs in
#[derive(Args, Debug, Default)]
pub struct RealmOptions {
    /// Enable encapsulation (`--secure-mode` or `--secure-mode=<value>`)
    #[arg(
        long,
        num_args = 0..=1,
        require_equals = true,
        default_missing_value = "1",
        value_name = "VALUE"
    )]
    pub secure_mode: Option<String>,

    /// Value of the `Prototype-Encapsulation` header the script arrived with
    #[arg(long, value_name = "VALUE")]
    pub header: Option<String>,

    /// Realm configuration (TOML, or JSON with a .json extension)
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Denied-access policy, overriding the configuration
    #[arg(long, value_enum)]
    pub policy: Option<PolicyArg>,

    /// Use the small sandbox limits
    #[arg(long)]
    pub sandbox: bool,
}

impl RealmOptions {
    /// Configuration file plus command-line overrides
    pub fn load_config(&self) -> Result<EncapConfig> {
        let mut config = match &self.config {
            Some(path) => load_config_file(path)?,
            None => EncapConfig::compatible(),
        };
        if let Some(policy) = self.policy {
            config.denial_policy = policy.into();
        }
        if self.sandbox {
            config.limits = RuntimeLimits::sandbox();
        }
        config
            .validate()
            .context("Invalid configuration after overrides")?;
        Ok(config)
    }

    /// Out-of-band mode signal: header, then launch flag, then environment
    ///
    /// The configuration's `secure_mode` is consulted by the realm after
    /// these.
    pub fn signal(&self) -> ModeSignal {
        let flag = self
            .secure_mode
            .as_ref()
            .map(|value| format!("{}={}", LAUNCH_FLAG, value));

        ModeSignal::first_present([
            ModeSignal::from_header_value(self.header.as_deref()),
            ModeSignal::from_args(flag),
            ModeSignal::from_env(),
        ])
    }
}

fn load_config_file(path: &Path) -> Result<EncapConfig> {
    let is_json = path.extension().is_some_and(|ext| ext == "json");
    let config = if is_json {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        EncapConfig::from_json(&content)?
    } else {
        EncapConfig::from_toml_file(path)?
    };
    Ok(config)
}

pub fn read_source(file: &str) -> Result<String> {
    std::fs::read_to_string(file).with_context(|| format!("Failed to read {}", file))
}

/// Run `f` on a dedicated thread with a large stack
pub fn on_realm_thread<F, T>(f: F) -> Result<T>
where
    F: FnOnce() -> Result<T> + Send + 'static,
    T: Send + 'static,
{
    std::thread::Builder::new()
        .name("realm".into())
        .stack_size(REALM_STACK_SIZE)
        .spawn(f)
        .context("Failed to start realm thread")?
        .join()
        .map_err(|_| anyhow!("Realm thread panicked"))?
}

#[cfg(test)]
mod tests {
    use super::*;
    use encap_policy::SignalSource;

    #[test]
    fn test_default_config() {
        let config = RealmOptions::default().load_config().unwrap();
        assert_eq!(config, EncapConfig::compatible());
    }

    #[test]
    fn test_overrides() {
        let options = RealmOptions {
            policy: Some(PolicyArg::Throw),
            sandbox: true,
            ..Default::default()
        };
        let config = options.load_config().unwrap();

        assert_eq!(config.denial_policy, DenialPolicy::Throw);
        assert_eq!(config.limits, RuntimeLimits::sandbox());
    }

    #[test]
    fn test_header_beats_flag() {
        let options = RealmOptions {
            header: Some("?0".into()),
            secure_mode: Some("1".into()),
            ..Default::default()
        };
        let signal = options.signal();

        assert!(!signal.is_enabled());
        assert_eq!(signal.source(), SignalSource::Header);
    }

    #[test]
    fn test_flag_signal() {
        let options = RealmOptions {
            secure_mode: Some("1".into()),
            ..Default::default()
        };
        let signal = options.signal();

        assert!(signal.is_enabled());
        assert_eq!(signal.source(), SignalSource::LaunchFlag);
    }

    #[test]
    fn test_json_config_file() {
        let path = std::env::temp_dir().join(format!("encap-config-{}.json", std::process::id()));
        std::fs::write(&path, r#"{"secure_mode": true, "denial_policy": "throw"}"#).unwrap();

        let options = RealmOptions {
            config: Some(path.clone()),
            ..Default::default()
        };
        let config = options.load_config().unwrap();
        std::fs::remove_file(&path).unwrap();

        assert_eq!(config.secure_mode, Some(true));
        assert_eq!(config.denial_policy, DenialPolicy::Throw);
    }

    #[test]
    fn test_realm_thread_result() {
        assert_eq!(on_realm_thread(|| Ok(41 + 1)).unwrap(), 42);
        assert!(on_realm_thread(|| -> Result<()> { Err(anyhow!("boom")) }).is_err());
    }
}
