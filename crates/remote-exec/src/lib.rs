//! Remote command execution over the system `ssh` and `rsync` binaries
//!
//! Commands run either in batch mode, piped into a remote shell with the exit
//! status reported back in-band, or in TTY mode attached to the local
//! terminal. Connections to a host are multiplexed over one ssh master when
//! enabled, and files move with rsync over the same ssh options.
//!
//! ```no_run
//! use remote_exec::{Host, RunConfig, SshClient};
//!
//! # fn main() -> remote_exec::Result<()> {
//! smol::block_on(async {
//!     let client = SshClient::new(true)?;
//!     let host = Host::new("web1")?.with_user("deploy");
//!     let uptime = client.run(&host, "uptime", &RunConfig::default()).await?;
//!     println!("{uptime}");
//!     Ok::<(), remote_exec::Error>(())
//! })
//! # }
//! ```

#![warn(missing_docs)]

pub mod backends;
pub mod client;
pub mod command;
pub mod config;
pub mod control_path;
pub mod error;
pub mod event;
pub mod host;
pub mod launcher;
pub mod logging;
pub mod mux;
pub mod process;
pub mod rsync;
pub mod sentinel;
pub mod sink;

pub use backends::LocalLauncher;
pub use client::{ExecutionResult, RunConfig, SshClient};
pub use command::Command;
pub use config::Settings;
pub use control_path::ControlPathResolver;
pub use error::{Error, Result};
pub use event::{LogFilter, ProcessEvent, ProcessEventType, StreamKind};
pub use host::{Host, Multiplexing};
pub use launcher::Launcher;
pub use mux::MuxManager;
pub use process::{ExitStatus, ProcessHandle, ProcessOutput};
pub use rsync::{Rsync, RsyncConfig};
pub use sink::{ConsoleSink, NullSink, OutputSink, TracingSink, Verbosity};
