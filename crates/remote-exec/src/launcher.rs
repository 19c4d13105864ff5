//! Launcher trait for starting local processes

use crate::command::Command;
use crate::error::Result;
use crate::event::ProcessEvent;
use crate::process::{ProcessHandle, ProcessOutput, run_to_completion};
use async_trait::async_trait;
use futures::stream::Stream;

/// Something that can start a [`Command`] and report what it does
///
/// [`crate::backends::LocalLauncher`] spawns real processes. Every `ssh` and
/// `rsync` invocation goes through this trait, so a scripted implementation
/// can stand in for the network in tests.
#[async_trait]
pub trait Launcher: Send + Sync + 'static {
    /// The event stream type this launcher produces
    type EventStream: Stream<Item = ProcessEvent> + Send + Unpin;

    /// The process handle type this launcher produces
    type Handle: ProcessHandle;

    /// Launch a command, returning its event stream and control handle
    async fn launch(&self, command: Command) -> Result<(Self::EventStream, Self::Handle)>;

    /// Run a command to completion without a timeout, capturing its output
    async fn output(&self, command: Command) -> Result<ProcessOutput> {
        run_to_completion(self, command, None, |_, _| {}).await
    }
}
