//! File transfers through the local `rsync` binary

use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

use crate::backends::LocalLauncher;
use crate::command::Command;
use crate::config::Settings;
use crate::error::{Error, Result};
use crate::event::{LogFilter, SkipEmpty};
use crate::host::Host;
use crate::launcher::Launcher;
use crate::process::run_to_completion;
use crate::sink::{NullSink, OutputSink};

/// Flags used when none are configured: archive, compress, progress
pub const DEFAULT_RSYNC_FLAGS: &str = "-azP";

/// Per-call options for a transfer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RsyncConfig {
    /// Kill rsync after this long; transfers are unbounded by default
    pub timeout: Option<Duration>,
    /// Leading flag cluster
    pub flags: String,
    /// Extra options placed after the flags, e.g. `--delete`
    pub options: Vec<String>,
}

impl Default for RsyncConfig {
    fn default() -> Self {
        Self {
            timeout: None,
            flags: DEFAULT_RSYNC_FLAGS.to_string(),
            options: Vec::new(),
        }
    }
}

impl RsyncConfig {
    /// Set the timeout
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Replace the flag cluster
    pub fn with_flags(mut self, flags: impl Into<String>) -> Self {
        self.flags = flags.into();
        self
    }

    /// Append an extra option
    pub fn with_option(mut self, option: impl Into<String>) -> Self {
        self.options.push(option.into());
        self
    }
}

/// One side of a transfer that lives on a host
fn remote_path(host: &Host, path: &str) -> String {
    format!("{}:{}", host.connection_string(), path)
}

/// Copies files to and from hosts with rsync over ssh
pub struct Rsync<L = LocalLauncher> {
    launcher: L,
    sink: Arc<dyn OutputSink>,
}

impl Rsync<LocalLauncher> {
    /// Transfers through the real `rsync` binary
    pub fn new() -> Self {
        Self::with_launcher(LocalLauncher)
    }

    /// Transfers configured from a settings file, printing to the console
    pub fn from_settings(settings: &Settings) -> Self {
        Self::new().with_shared_sink(settings.sink())
    }
}

impl Default for Rsync<LocalLauncher> {
    fn default() -> Self {
        Self::new()
    }
}

impl<L: Launcher> Rsync<L> {
    /// Transfers on an arbitrary launcher; output is discarded until a sink is set
    pub fn with_launcher(launcher: L) -> Self {
        Self {
            launcher,
            sink: Arc::new(NullSink),
        }
    }

    /// Send live output to `sink`
    pub fn with_sink(self, sink: impl OutputSink + 'static) -> Self {
        self.with_shared_sink(Arc::new(sink))
    }

    /// Share a sink with other executors
    pub fn with_shared_sink(mut self, sink: Arc<dyn OutputSink>) -> Self {
        self.sink = sink;
        self
    }

    /// The launcher in use
    pub fn launcher(&self) -> &L {
        &self.launcher
    }

    /// Copy a local path to `remote` on `host`
    pub async fn upload(
        &self,
        host: &Host,
        local: &str,
        remote: &str,
        config: &RsyncConfig,
    ) -> Result<()> {
        let destination = remote_path(host, remote);
        self.sync(host, local, &destination, config).await
    }

    /// Copy `remote` on `host` to a local path
    pub async fn download(
        &self,
        host: &Host,
        remote: &str,
        local: &str,
        config: &RsyncConfig,
    ) -> Result<()> {
        let source = remote_path(host, remote);
        self.sync(host, &source, local, config).await
    }

    /// Run rsync from `source` to `destination`, connecting with `host`'s
    /// ssh options; `host` also labels output and errors
    pub async fn sync(
        &self,
        host: &Host,
        source: &str,
        destination: &str,
        config: &RsyncConfig,
    ) -> Result<()> {
        let invocation = build_rsync_command(host, source, destination, config);
        debug!(host = host.hostname(), invocation = %invocation, "running transfer");

        let stream_live = self.sink.is_debug();
        let sink = self.sink.as_ref();
        let output = run_to_completion(&self.launcher, invocation, config.timeout, |stream, line| {
            if !stream_live {
                return;
            }
            if let Some(line) = SkipEmpty.filter(line, stream) {
                sink.write_line(host.hostname(), stream, &line);
            }
        })
        .await?;

        if !output.status.success() {
            return Err(Error::Transfer {
                hostname: host.hostname().to_string(),
                exit_code: output.status.code_or_failure(),
                error_output: output.stderr,
            });
        }

        Ok(())
    }
}

/// `rsync <flags> [options] [-e "ssh <base options>"] <source> <destination>`
///
/// The remote shell is only spelled out when the host needs non-default ssh
/// arguments; otherwise rsync's own default `ssh` is used.
pub fn build_rsync_command(
    host: &Host,
    source: &str,
    destination: &str,
    config: &RsyncConfig,
) -> Command {
    let mut command = Command::new("rsync");
    if !config.flags.is_empty() {
        command.arg(&config.flags);
    }
    command.args(&config.options);

    let ssh_options = host.connection_options();
    if !ssh_options.is_empty() {
        command.arg("-e").arg(remote_shell(&ssh_options));
    }

    command.arg(source).arg(destination);
    command
}

/// `ssh` followed by each option, escaped so rsync splits it back correctly
fn remote_shell(options: &[String]) -> String {
    std::iter::once("ssh".to_string())
        .chain(
            options
                .iter()
                .map(|option| shell_escape::unix::escape(option.as_str().into()).into_owned()),
        )
        .collect::<Vec<_>>()
        .join(" ")
}
