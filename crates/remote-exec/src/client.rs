//! Running commands on remote hosts over ssh
//!
//! Two modes:
//!
//! - **Batch** (default): the command text is piped verbatim into the host's
//!   shell (`bash -s`) on stdin and the exit status comes back through the
//!   in-band sentinel, see [`crate::sentinel`]. Connections are multiplexed
//!   when enabled for the host.
//! - **TTY**: the command is shell-escaped onto the ssh command line with
//!   `-tt` and the local terminal is handed to the remote process. Meant for
//!   interactive commands; nothing is captured.

use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

use crate::backends::LocalLauncher;
use crate::command::Command;
use crate::config::Settings;
use crate::control_path::ControlPathResolver;
use crate::error::{Error, Result};
use crate::event::{LogFilter, StreamKind};
use crate::host::Host;
use crate::launcher::Launcher;
use crate::mux::MuxManager;
use crate::process::run_to_completion;
use crate::sentinel::{self, SentinelFilter};
use crate::sink::{NullSink, OutputSink};

/// Timeout applied to remote commands unless the caller says otherwise
pub const DEFAULT_COMMAND_TIMEOUT: Duration = Duration::from_secs(300);

/// Per-call options for [`SshClient::run`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunConfig {
    /// Kill the process after this long; `None` waits forever
    pub timeout: Option<Duration>,
    /// Attach the local terminal instead of running in batch mode
    pub tty: bool,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            timeout: Some(DEFAULT_COMMAND_TIMEOUT),
            tty: false,
        }
    }
}

impl RunConfig {
    /// Set the timeout
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Wait for the command however long it takes
    pub fn without_timeout(mut self) -> Self {
        self.timeout = None;
        self
    }

    /// Run in TTY mode
    pub fn with_tty(mut self, tty: bool) -> Self {
        self.tty = tty;
        self
    }
}

/// Decoded outcome of a remote command
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionResult {
    /// Standard output with the sentinel removed
    pub output: String,
    /// Standard error as produced
    pub error_output: String,
    /// Reported exit status, `-1` if none was reported
    pub exit_status: i32,
}

impl ExecutionResult {
    /// Whether the remote command reported status 0
    pub fn success(&self) -> bool {
        self.exit_status == 0
    }
}

/// Runs commands on remote hosts through the local `ssh` binary
pub struct SshClient<L = LocalLauncher> {
    launcher: L,
    mux: MuxManager,
    sink: Arc<dyn OutputSink>,
}

impl SshClient<LocalLauncher> {
    /// Client spawning real `ssh` processes, with control paths under the
    /// current user's home directory
    pub fn new(multiplexing: bool) -> Result<Self> {
        let resolver = ControlPathResolver::from_home_dir()?;
        Ok(Self::with_launcher(
            LocalLauncher,
            MuxManager::new(resolver, multiplexing),
        ))
    }

    /// Client configured from a settings file, printing to the console
    pub fn from_settings(settings: &Settings) -> Result<Self> {
        Ok(Self::new(settings.multiplexing)?.with_shared_sink(settings.sink()))
    }
}

impl<L: Launcher> SshClient<L> {
    /// Client on an arbitrary launcher; output is discarded until a sink is set
    pub fn with_launcher(launcher: L, mux: MuxManager) -> Self {
        Self {
            launcher,
            mux,
            sink: Arc::new(NullSink),
        }
    }

    /// Send live output and diagnostics to `sink`
    pub fn with_sink(self, sink: impl OutputSink + 'static) -> Self {
        self.with_shared_sink(Arc::new(sink))
    }

    /// Share a sink with other clients
    pub fn with_shared_sink(mut self, sink: Arc<dyn OutputSink>) -> Self {
        self.sink = sink;
        self
    }

    /// The launcher in use
    pub fn launcher(&self) -> &L {
        &self.launcher
    }

    /// The multiplexing manager in use
    pub fn mux(&self) -> &MuxManager {
        &self.mux
    }

    /// Run `command` on `host` and return its output
    ///
    /// In batch mode a non-zero status becomes [`Error::RemoteCommand`]. In TTY
    /// mode the output belongs to the terminal, so the returned string is
    /// empty and a non-zero status is only logged.
    pub async fn run(&self, host: &Host, command: &str, config: &RunConfig) -> Result<String> {
        let result = self.execute(host, command, config).await?;

        if config.tty {
            if !result.success() {
                warn!(
                    host = host.hostname(),
                    command,
                    exit_status = result.exit_status,
                    "interactive command exited with non-zero status"
                );
            }
            return Ok(result.output);
        }

        if !result.success() {
            return Err(Error::RemoteCommand {
                hostname: host.hostname().to_string(),
                command: command.to_string(),
                exit_status: result.exit_status,
                output: result.output,
                error_output: result.error_output,
            });
        }

        Ok(result.output)
    }

    /// Run `command` on `host` and return the decoded result whatever the
    /// remote status
    ///
    /// Launch failures and timeouts are still errors.
    pub async fn execute(
        &self,
        host: &Host,
        command: &str,
        config: &RunConfig,
    ) -> Result<ExecutionResult> {
        if config.tty {
            return self.execute_tty(host, command, config.timeout).await;
        }

        let options = self
            .mux
            .ensure_session(&self.launcher, host, self.sink.as_ref())
            .await?;
        let invocation = build_batch_command(host, &options, command);
        debug!(host = host.hostname(), invocation = %invocation, "running remote command");

        if self.sink.is_very_verbose() {
            self.sink.write_line(
                host.hostname(),
                StreamKind::Stdout,
                &format!("run {command}"),
            );
        }

        let stream_live = self.sink.is_debug();
        let sink = self.sink.as_ref();
        let output = run_to_completion(&self.launcher, invocation, config.timeout, |stream, line| {
            if !stream_live {
                return;
            }
            if let Some(line) = SentinelFilter.filter(line, stream) {
                sink.write_line(host.hostname(), stream, &line);
            }
        })
        .await?;

        let decoded = sentinel::decode(&output.stdout);
        debug!(
            host = host.hostname(),
            exit_status = decoded.exit_status,
            ssh_status = ?output.status.code,
            "remote command finished"
        );

        Ok(ExecutionResult {
            output: decoded.output,
            error_output: output.stderr,
            exit_status: decoded.exit_status,
        })
    }

    /// Stop the persisted ssh master for `host`, if any
    pub async fn close(&self, host: &Host) -> Result<()> {
        self.mux.close_session(&self.launcher, host).await
    }

    async fn execute_tty(
        &self,
        host: &Host,
        command: &str,
        timeout: Option<Duration>,
    ) -> Result<ExecutionResult> {
        let invocation = build_tty_command(host, command);
        debug!(host = host.hostname(), invocation = %invocation, "running interactive command");

        let output = run_to_completion(&self.launcher, invocation, timeout, |_, _| {}).await?;

        Ok(ExecutionResult {
            output: output.stdout,
            error_output: output.stderr,
            exit_status: output.status.code_or_failure(),
        })
    }
}

/// `ssh <options> <connection> '<shell>; printf "[exit_code:%s]" $?;'` with
/// the command text on stdin
pub fn build_batch_command(host: &Host, options: &[String], command: &str) -> Command {
    Command::builder("ssh")
        .args(options)
        .arg(host.connection_string())
        .arg(sentinel::remote_script(host.shell()))
        .stdin(command.as_bytes())
        .build()
}

/// `ssh <base options> -tt <connection> <escaped command>` attached to the
/// terminal, never multiplexed
pub fn build_tty_command(host: &Host, command: &str) -> Command {
    let escaped = shell_escape::unix::escape(command.into());
    Command::builder("ssh")
        .args(host.connection_options())
        .arg("-tt")
        .arg(host.connection_string())
        .arg(escaped.into_owned())
        .interactive(true)
        .build()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_batch_command_shape() {
        let host = Host::new("web1").unwrap().with_user("deploy");
        let command = build_batch_command(&host, &["-p".into(), "2222".into()], "ls -la");

        assert_eq!(command.get_program(), "ssh");
        assert_eq!(
            command.args_lossy(),
            vec![
                "-p",
                "2222",
                "deploy@web1",
                "bash -s; printf \"[exit_code:%s]\" $?;"
            ]
        );
        assert_eq!(command.get_stdin(), Some(&b"ls -la"[..]));
        assert!(!command.is_interactive());
    }

    #[test]
    fn test_batch_command_uses_host_shell() {
        let host = Host::new("web1").unwrap().with_shell("sh -s");
        let command = build_batch_command(&host, &[], "true");
        assert_eq!(
            command.args_lossy().last().map(String::as_str),
            Some("sh -s; printf \"[exit_code:%s]\" $?;")
        );
    }

    #[test]
    fn test_tty_command_escapes_and_attaches() {
        let host = Host::new("web1").unwrap().with_port(2200);
        let command = build_tty_command(&host, "echo \"a b\"");

        assert_eq!(
            command.args_lossy(),
            vec!["-p", "2200", "-tt", "web1", "'echo \"a b\"'"]
        );
        assert!(command.is_interactive());
        assert!(command.get_stdin().is_none());
    }

    #[test]
    fn test_run_config_builders() {
        let config = RunConfig::default();
        assert_eq!(config.timeout, Some(DEFAULT_COMMAND_TIMEOUT));
        assert!(!config.tty);

        let config = config.with_tty(true).without_timeout();
        assert_eq!(config.timeout, None);
        assert!(config.tty);

        let config = RunConfig::default().with_timeout(Duration::from_secs(5));
        assert_eq!(config.timeout, Some(Duration::from_secs(5)));
    }

    #[test]
    fn test_execution_result_success() {
        let result = ExecutionResult {
            output: String::new(),
            error_output: String::new(),
            exit_status: -1,
        };
        assert!(!result.success());
    }
}
