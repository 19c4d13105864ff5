//! Settings file for the engine
//!
//! ```yaml
//! multiplexing: true
//! command_timeout: 300
//! transfer_timeout: null
//! verbosity: very_verbose
//! decorated: true
//! ```
//!
//! Every field is optional. `REMOTE_EXEC_MULTIPLEXING` and
//! `REMOTE_EXEC_VERBOSITY` override the file through [`Settings::apply_env`].

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use crate::client::RunConfig;
use crate::error::{Error, Result};
use crate::host::{DEFAULT_SHELL, Host};
use crate::rsync::{DEFAULT_RSYNC_FLAGS, RsyncConfig};
use crate::sink::{ConsoleSink, OutputSink, Verbosity};

/// Environment variable overriding [`Settings::multiplexing`]
pub const MULTIPLEXING_ENV: &str = "REMOTE_EXEC_MULTIPLEXING";

/// Environment variable overriding [`Settings::verbosity`]
pub const VERBOSITY_ENV: &str = "REMOTE_EXEC_VERBOSITY";

/// Engine-wide settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Multiplex hosts that do not say otherwise
    pub multiplexing: bool,
    /// Remote command timeout in seconds, `null` for none
    pub command_timeout: Option<u64>,
    /// Transfer timeout in seconds, `null` for none
    pub transfer_timeout: Option<u64>,
    /// Batch shell for hosts built through [`Settings::host`]
    pub shell: String,
    /// rsync flag cluster
    pub rsync_flags: String,
    /// Console verbosity
    pub verbosity: Verbosity,
    /// Color stderr lines on the console
    pub decorated: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            multiplexing: true,
            command_timeout: Some(300),
            transfer_timeout: None,
            shell: DEFAULT_SHELL.to_string(),
            rsync_flags: DEFAULT_RSYNC_FLAGS.to_string(),
            verbosity: Verbosity::Normal,
            decorated: false,
        }
    }
}

impl Settings {
    /// Load settings from a YAML file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml_str(&content)
    }

    /// Parse settings from YAML
    pub fn from_yaml_str(content: &str) -> Result<Self> {
        let settings: Settings = serde_yaml::from_str(content)?;
        settings.validate()?;
        Ok(settings)
    }

    fn validate(&self) -> Result<()> {
        if self.shell.trim().is_empty() {
            return Err(Error::configuration("shell must not be empty"));
        }
        Ok(())
    }

    /// Apply overrides from the process environment
    pub fn apply_env(&mut self) -> Result<()> {
        self.apply_env_from(|key| std::env::var(key).ok())
    }

    /// Apply overrides, looking variables up through `lookup`
    pub fn apply_env_from<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(value) = lookup(MULTIPLEXING_ENV) {
            self.multiplexing = parse_flag(MULTIPLEXING_ENV, &value)?;
        }
        if let Some(value) = lookup(VERBOSITY_ENV) {
            self.verbosity = value.parse()?;
        }
        Ok(())
    }

    /// Per-call options for remote commands
    pub fn run_config(&self) -> RunConfig {
        RunConfig {
            timeout: self.command_timeout.map(Duration::from_secs),
            tty: false,
        }
    }

    /// Per-call options for transfers
    pub fn rsync_config(&self) -> RsyncConfig {
        RsyncConfig {
            timeout: self.transfer_timeout.map(Duration::from_secs),
            flags: self.rsync_flags.clone(),
            options: Vec::new(),
        }
    }

    /// Console sink at the configured verbosity
    pub fn sink(&self) -> Arc<dyn OutputSink> {
        Arc::new(ConsoleSink::new(self.verbosity, self.decorated))
    }

    /// Describe `hostname` with the configured batch shell
    pub fn host(&self, hostname: impl Into<String>) -> Result<Host> {
        Ok(Host::new(hostname)?.with_shell(&self.shell))
    }
}

fn parse_flag(name: &str, value: &str) -> Result<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => Err(Error::configuration(format!(
            "{name} must be a boolean, got `{other}`"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_defaults() {
        let settings = Settings::from_yaml_str("{}").unwrap();
        assert_eq!(settings, Settings::default());
        assert!(settings.multiplexing);
        assert_eq!(settings.run_config().timeout, Some(Duration::from_secs(300)));
        assert_eq!(settings.rsync_config().timeout, None);
        assert_eq!(settings.rsync_config().flags, "-azP");
    }

    #[test]
    fn test_null_timeout_disables_it() {
        let settings = Settings::from_yaml_str("command_timeout: null\n").unwrap();
        assert_eq!(settings.run_config().timeout, None);
    }

    #[test]
    fn test_host_uses_configured_shell() {
        let settings = Settings::from_yaml_str("shell: sh -s\n").unwrap();
        let host = settings.host("web1").unwrap();
        assert_eq!(host.shell(), "sh -s");
        assert!(matches!(settings.host(""), Err(Error::Configuration(_))));
    }

    #[test]
    fn test_empty_shell_rejected() {
        assert!(matches!(
            Settings::from_yaml_str("shell: ''\n"),
            Err(Error::Configuration(_))
        ));
    }

    #[test]
    fn test_malformed_yaml() {
        assert!(matches!(
            Settings::from_yaml_str("multiplexing: [1, 2"),
            Err(Error::Yaml(_))
        ));
    }

    #[test]
    fn test_env_overrides() {
        let env: HashMap<&str, &str> = [
            (MULTIPLEXING_ENV, "off"),
            (VERBOSITY_ENV, "debug"),
        ]
        .into_iter()
        .collect();

        let mut settings = Settings::default();
        settings
            .apply_env_from(|key| env.get(key).map(|value| value.to_string()))
            .unwrap();
        assert!(!settings.multiplexing);
        assert_eq!(settings.verbosity, Verbosity::Debug);
        assert!(settings.sink().is_debug());
    }

    #[test]
    fn test_bad_env_value() {
        let mut settings = Settings::default();
        let err = settings
            .apply_env_from(|key| (key == MULTIPLEXING_ENV).then(|| "maybe".to_string()))
            .unwrap_err();
        assert!(err.to_string().contains(MULTIPLEXING_ENV));
    }
}
