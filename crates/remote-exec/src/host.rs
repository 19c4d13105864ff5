//! Host descriptors

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};

/// Remote shell that reads the batch script from stdin
pub const DEFAULT_SHELL: &str = "bash -s";

/// Per-host multiplexing override
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Multiplexing {
    /// Follow the process-wide default
    #[default]
    Inherit,
    /// Always multiplex this host
    Enabled,
    /// Never multiplex this host
    Disabled,
}

impl Multiplexing {
    /// Resolve against the process-wide default
    pub fn resolve(self, default: bool) -> bool {
        match self {
            Multiplexing::Inherit => default,
            Multiplexing::Enabled => true,
            Multiplexing::Disabled => false,
        }
    }
}

impl From<Option<bool>> for Multiplexing {
    fn from(value: Option<bool>) -> Self {
        match value {
            None => Multiplexing::Inherit,
            Some(true) => Multiplexing::Enabled,
            Some(false) => Multiplexing::Disabled,
        }
    }
}

/// A remote endpoint and how to connect to it
///
/// Built once through the `with_*` methods and only read afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Host {
    hostname: String,
    user: Option<String>,
    port: Option<u16>,
    identity_file: Option<PathBuf>,
    config_file: Option<PathBuf>,
    forward_agent: bool,
    ssh_args: Vec<String>,
    shell: String,
    multiplexing: Multiplexing,
}

impl Host {
    /// Describe `hostname`; fails if it is empty
    pub fn new(hostname: impl Into<String>) -> Result<Self> {
        let hostname = hostname.into();
        if hostname.trim().is_empty() {
            return Err(Error::configuration("hostname must not be empty"));
        }

        Ok(Self {
            hostname,
            user: None,
            port: None,
            identity_file: None,
            config_file: None,
            forward_agent: false,
            ssh_args: Vec::new(),
            shell: DEFAULT_SHELL.to_string(),
            multiplexing: Multiplexing::Inherit,
        })
    }

    /// Set the remote user
    pub fn with_user(mut self, user: impl Into<String>) -> Self {
        self.user = Some(user.into());
        self
    }

    /// Set the ssh port
    pub fn with_port(mut self, port: u16) -> Self {
        self.port = Some(port);
        self
    }

    /// Set the identity file (private key)
    pub fn with_identity_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.identity_file = Some(path.into());
        self
    }

    /// Use an ssh config file instead of `~/.ssh/config`
    pub fn with_config_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.config_file = Some(path.into());
        self
    }

    /// Enable ssh agent forwarding (`-A`)
    pub fn with_forward_agent(mut self, enabled: bool) -> Self {
        self.forward_agent = enabled;
        self
    }

    /// Append a raw ssh argument, kept in order
    pub fn with_ssh_arg(mut self, arg: impl Into<String>) -> Self {
        self.ssh_args.push(arg.into());
        self
    }

    /// Append `-o key=value`
    pub fn with_ssh_option(self, key: &str, value: impl std::fmt::Display) -> Self {
        self.with_ssh_arg("-o").with_ssh_arg(format!("{key}={value}"))
    }

    /// Shell that runs batch scripts on the remote side
    pub fn with_shell(mut self, shell: impl Into<String>) -> Self {
        self.shell = shell.into();
        self
    }

    /// Override the process-wide multiplexing default for this host
    pub fn with_multiplexing(mut self, multiplexing: impl Into<Multiplexing>) -> Self {
        self.multiplexing = multiplexing.into();
        self
    }

    /// The hostname
    pub fn hostname(&self) -> &str {
        &self.hostname
    }

    /// The remote user, if set
    pub fn user(&self) -> Option<&str> {
        self.user.as_deref()
    }

    /// The port, if set
    pub fn port(&self) -> Option<u16> {
        self.port
    }

    /// The identity file, if set
    pub fn identity_file(&self) -> Option<&Path> {
        self.identity_file.as_deref()
    }

    /// Raw ssh arguments in the order they were added
    pub fn ssh_args(&self) -> &[String] {
        &self.ssh_args
    }

    /// Remote batch shell
    pub fn shell(&self) -> &str {
        &self.shell
    }

    /// Multiplexing override
    pub fn multiplexing(&self) -> Multiplexing {
        self.multiplexing
    }

    /// `user@hostname`, or just the hostname when no user is set
    pub fn connection_string(&self) -> String {
        match &self.user {
            Some(user) => format!("{}@{}", user, self.hostname),
            None => self.hostname.clone(),
        }
    }

    /// Base ssh arguments for this host, without multiplexing options
    pub fn connection_options(&self) -> Vec<String> {
        let mut options = Vec::new();

        if self.forward_agent {
            options.push("-A".to_string());
        }
        if let Some(config) = &self.config_file {
            options.push("-F".to_string());
            options.push(config.to_string_lossy().into_owned());
        }
        if let Some(port) = self.port {
            options.push("-p".to_string());
            options.push(port.to_string());
        }
        if let Some(identity) = &self.identity_file {
            options.push("-i".to_string());
            options.push(identity.to_string_lossy().into_owned());
        }
        options.extend(self.ssh_args.iter().cloned());

        options
    }
}
