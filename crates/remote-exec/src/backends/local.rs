//! Local process execution backend

use async_process::{Child, ChildStdin};
use async_trait::async_trait;
use futures::stream::{BoxStream, Stream, StreamExt};
use futures_lite::io::{AsyncBufReadExt, AsyncRead, AsyncWriteExt, BufReader};
use std::io;
use std::pin::Pin;
use std::task::{Context, Poll};

use crate::command::Command;
use crate::error::{Error, Result};
use crate::event::{ProcessEvent, ProcessEventType};
use crate::launcher::Launcher;
use crate::process::{ExitStatus, ProcessHandle};

/// Launcher for executing processes locally
#[derive(Debug, Clone, Copy, Default)]
pub struct LocalLauncher;

/// A handle to control a local process
pub struct LocalProcessHandle {
    /// The underlying child process
    child: Child,
    /// Stdin pipe, present until closed
    stdin: Option<ChildStdin>,
    /// Whether to kill the process on drop
    kill_on_drop: bool,
}

/// Stream of process events
pub struct ProcessEventStream {
    stdout: Option<BoxStream<'static, io::Result<String>>>,
    stderr: Option<BoxStream<'static, io::Result<String>>>,
    started_sent: bool,
    child_id: u32,
}

#[async_trait]
impl Launcher for LocalLauncher {
    type EventStream = ProcessEventStream;
    type Handle = LocalProcessHandle;

    async fn launch(&self, command: Command) -> Result<(Self::EventStream, Self::Handle)> {
        let mut async_cmd = command.prepare();

        let mut child = async_cmd.spawn().map_err(|e| {
            Error::spawn_failed(format!(
                "Failed to spawn {}: {}",
                command.get_program().to_string_lossy(),
                e
            ))
        })?;

        let child_id = child.id();
        let stdout = child.stdout.take().map(raw_lines);
        let stderr = child.stderr.take().map(raw_lines);
        let stdin = child.stdin.take();

        let events = ProcessEventStream {
            stdout,
            stderr,
            started_sent: false,
            child_id,
        };

        let handle = LocalProcessHandle {
            child,
            stdin,
            kill_on_drop: true,
        };

        Ok((events, handle))
    }
}

#[async_trait]
impl ProcessHandle for LocalProcessHandle {
    fn pid(&self) -> Option<u32> {
        Some(self.child.id())
    }

    async fn write_stdin(&mut self, data: &[u8]) -> Result<()> {
        if let Some(stdin) = &mut self.stdin {
            let written = async {
                stdin.write_all(data).await?;
                stdin.flush().await
            }
            .await;

            match written {
                Ok(()) => {}
                // The process exited before reading its input; its exit status tells the story
                Err(e) if e.kind() == std::io::ErrorKind::BrokenPipe => {
                    tracing::debug!(pid = self.child.id(), "stdin closed by process");
                }
                Err(e) => return Err(e.into()),
            }
        }
        Ok(())
    }

    fn close_stdin(&mut self) {
        self.stdin.take();
    }

    async fn wait(&mut self) -> Result<ExitStatus> {
        let status = self
            .child
            .status()
            .await
            .map_err(|e| Error::spawn_failed(format!("Failed to wait for process: {}", e)))?;

        Ok(ExitStatus {
            code: status.code(),
            #[cfg(unix)]
            signal: {
                use std::os::unix::process::ExitStatusExt;
                status.signal()
            },
        })
    }

    async fn kill(&mut self) -> Result<()> {
        self.child.kill()?;
        Ok(())
    }
}

impl Drop for LocalProcessHandle {
    fn drop(&mut self) {
        if self.kill_on_drop {
            // Synchronous kill; a process that already exited makes this a no-op
            let _ = self.child.kill();
        }
    }
}

/// Split a pipe into lines that keep their terminator.
///
/// Bytes that are not UTF-8 are replaced rather than ending the stream; only
/// EOF or a read error does that.
fn raw_lines<R>(reader: R) -> BoxStream<'static, io::Result<String>>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    futures::stream::unfold(Some(BufReader::new(reader)), |state| async move {
        let mut reader = state?;
        let mut line = Vec::new();
        match reader.read_until(b'\n', &mut line).await {
            Ok(0) => None,
            Ok(_) => Some((
                Ok(String::from_utf8_lossy(&line).into_owned()),
                Some(reader),
            )),
            Err(e) => Some((Err(e), None)),
        }
    })
    .boxed()
}

impl Stream for ProcessEventStream {
    type Item = ProcessEvent;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        // Send Started event first
        if !self.started_sent {
            self.started_sent = true;
            let event = ProcessEvent::new(ProcessEventType::Started { pid: self.child_id });
            return Poll::Ready(Some(event));
        }

        if let Some(stdout) = &mut self.stdout {
            match stdout.poll_next_unpin(cx) {
                Poll::Ready(Some(Ok(line))) => {
                    return Poll::Ready(Some(ProcessEvent::stdout(line)));
                }
                Poll::Ready(Some(Err(e))) => {
                    tracing::debug!(pid = self.child_id, error = %e, "stdout read failed");
                    self.stdout = None;
                }
                Poll::Ready(None) => {
                    self.stdout = None;
                }
                Poll::Pending => {}
            }
        }

        if let Some(stderr) = &mut self.stderr {
            match stderr.poll_next_unpin(cx) {
                Poll::Ready(Some(Ok(line))) => {
                    return Poll::Ready(Some(ProcessEvent::stderr(line)));
                }
                Poll::Ready(Some(Err(e))) => {
                    tracing::debug!(pid = self.child_id, error = %e, "stderr read failed");
                    self.stderr = None;
                }
                Poll::Ready(None) => {
                    self.stderr = None;
                }
                Poll::Pending => {}
            }
        }

        // If both streams are closed, the stream is exhausted
        if self.stdout.is_none() && self.stderr.is_none() {
            return Poll::Ready(None);
        }

        // One or both streams are still pending
        Poll::Pending
    }
}
