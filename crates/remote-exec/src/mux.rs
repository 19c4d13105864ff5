//! ssh connection multiplexing
//!
//! The control socket belongs to ssh, not to us: `ControlMaster=auto` makes
//! the first real invocation create it and later ones reuse it, and ssh's own
//! locking settles races between concurrent callers. This module only decides
//! whether a host is multiplexed, builds the options, and probes whether a
//! master is already up so the first connection can be announced.

use std::time::Duration;
use tracing::{debug, warn};

use crate::command::Command;
use crate::control_path::ControlPathResolver;
use crate::error::Result;
use crate::event::StreamKind;
use crate::host::Host;
use crate::launcher::Launcher;
use crate::process::run_to_completion;
use crate::sink::OutputSink;

/// Seconds a master stays up after its last client disconnects
pub const CONTROL_PERSIST_SECS: u64 = 60;

/// Line written to the sink when a host has no master yet
pub const INIT_NOTICE: &str = "ssh multiplexing initialization";

/// What `ssh -O check` prints when a master is alive
const MASTER_RUNNING: &str = "Master running";

/// Upper bound for `ssh -O check` / `ssh -O exit`
const CONTROL_COMMAND_TIMEOUT: Duration = Duration::from_secs(10);

/// Decides multiplexing per host and prepares session options
#[derive(Debug, Clone)]
pub struct MuxManager {
    resolver: ControlPathResolver,
    default_enabled: bool,
}

impl MuxManager {
    /// Create a manager with an explicit process-wide default
    pub fn new(resolver: ControlPathResolver, default_enabled: bool) -> Self {
        Self {
            resolver,
            default_enabled,
        }
    }

    /// The control path resolver in use
    pub fn resolver(&self) -> &ControlPathResolver {
        &self.resolver
    }

    /// Whether `host` is multiplexed, after applying its override
    pub fn is_enabled(&self, host: &Host) -> bool {
        host.multiplexing().resolve(self.default_enabled)
    }

    /// Base options plus the session-reuse options when multiplexing applies
    pub fn session_options(&self, host: &Host) -> Result<Vec<String>> {
        let mut options = host.connection_options();
        if !self.is_enabled(host) {
            return Ok(options);
        }

        let control_path = self.resolver.resolve(host)?;
        options.extend([
            "-o".to_string(),
            "ControlMaster=auto".to_string(),
            "-o".to_string(),
            format!("ControlPersist={CONTROL_PERSIST_SECS}"),
            "-o".to_string(),
            format!("ControlPath={control_path}"),
        ]);
        Ok(options)
    }

    /// Options to run a command against `host` with, announcing a new master
    ///
    /// The probe never creates the socket; the caller's next real invocation
    /// does, through `ControlMaster=auto`.
    pub async fn ensure_session<L>(
        &self,
        launcher: &L,
        host: &Host,
        sink: &dyn OutputSink,
    ) -> Result<Vec<String>>
    where
        L: Launcher + ?Sized,
    {
        let options = self.session_options(host)?;
        if !self.is_enabled(host) {
            return Ok(options);
        }

        if !self.is_master_running(launcher, host, &options).await {
            sink.write_line(host.hostname(), StreamKind::Stdout, INIT_NOTICE);
        }

        Ok(options)
    }

    /// Ask ssh whether a master is serving `host` on the given options
    pub async fn is_master_running<L>(&self, launcher: &L, host: &Host, options: &[String]) -> bool
    where
        L: Launcher + ?Sized,
    {
        let command = control_command("check", host, options);
        match run_to_completion(launcher, command, Some(CONTROL_COMMAND_TIMEOUT), |_, _| {}).await
        {
            Ok(output) => {
                let running = output.stdout.contains(MASTER_RUNNING)
                    || output.stderr.contains(MASTER_RUNNING);
                debug!(host = host.hostname(), running, "probed ssh master");
                running
            }
            Err(e) => {
                warn!(host = host.hostname(), error = %e, "ssh master probe failed");
                false
            }
        }
    }

    /// Tell the master for `host` to exit; a missing master is not an error
    pub async fn close_session<L>(&self, launcher: &L, host: &Host) -> Result<()>
    where
        L: Launcher + ?Sized,
    {
        if !self.is_enabled(host) {
            return Ok(());
        }

        let options = self.session_options(host)?;
        let command = control_command("exit", host, &options);
        let output =
            run_to_completion(launcher, command, Some(CONTROL_COMMAND_TIMEOUT), |_, _| {}).await?;
        debug!(
            host = host.hostname(),
            code = ?output.status.code,
            "closed ssh master"
        );
        Ok(())
    }
}

/// `ssh -O <operation> <options> <connection>`
fn control_command(operation: &str, host: &Host, options: &[String]) -> Command {
    let mut command = Command::new("ssh");
    command
        .arg("-O")
        .arg(operation)
        .args(options)
        .arg(host.connection_string());
    command
}
