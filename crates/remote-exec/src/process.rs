//! Process handles and the timeout-bounded run loop shared by every executor

use async_trait::async_trait;
use futures::StreamExt;
use std::time::Duration;

use crate::command::Command;
use crate::error::{Error, Result};
use crate::event::{ProcessEventType, StreamKind};
use crate::launcher::Launcher;

/// A handle to control a running process
#[async_trait]
pub trait ProcessHandle: Send + Sync {
    /// Get the process ID
    fn pid(&self) -> Option<u32>;

    /// Write bytes to the process's stdin
    async fn write_stdin(&mut self, data: &[u8]) -> Result<()>;

    /// Close stdin so the process sees end of input
    fn close_stdin(&mut self);

    /// Wait for the process to complete and return its exit status
    async fn wait(&mut self) -> Result<ExitStatus>;

    /// Send SIGKILL (or equivalent) to forcefully stop the process
    async fn kill(&mut self) -> Result<()>;
}

/// Process exit status
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExitStatus {
    /// Exit code if the process exited normally
    pub code: Option<i32>,
    /// Signal that terminated the process (Unix only)
    #[cfg(unix)]
    pub signal: Option<i32>,
}

impl ExitStatus {
    /// Status for a process that exited normally with `code`
    pub fn from_code(code: i32) -> Self {
        Self {
            code: Some(code),
            #[cfg(unix)]
            signal: None,
        }
    }

    /// Returns true if the process exited successfully (code 0)
    pub fn success(&self) -> bool {
        self.code == Some(0)
    }

    /// Exit code, or -1 when the process was terminated by a signal
    pub fn code_or_failure(&self) -> i32 {
        self.code.unwrap_or(-1)
    }
}

/// Everything a finished process produced
///
/// Both streams are kept exactly as produced, line terminators included.
/// Bytes that are not UTF-8 come through as U+FFFD.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessOutput {
    /// Collected stdout
    pub stdout: String,
    /// Collected stderr
    pub stderr: String,
    /// How the process exited
    pub status: ExitStatus,
}

/// Launch `command`, feed its stdin, stream every line to `on_line` and wait
/// for it to exit.
///
/// `on_line` sees each line without its `\n` or `\r\n` terminator.
///
/// When `timeout` elapses first the process is killed and [`Error::Timeout`]
/// is returned; lines already handed to `on_line` stay delivered.
pub async fn run_to_completion<L, F>(
    launcher: &L,
    command: Command,
    timeout: Option<Duration>,
    mut on_line: F,
) -> Result<ProcessOutput>
where
    L: Launcher + ?Sized,
    F: FnMut(StreamKind, &str) + Send,
{
    let description = command.to_string();
    let stdin = command.get_stdin().map(<[u8]>::to_vec);

    let (mut events, mut handle) = launcher.launch(command).await?;
    let mut stdout = String::new();
    let mut stderr = String::new();

    let finished = {
        let work = async {
            let feed = async {
                if let Some(data) = &stdin {
                    handle.write_stdin(data).await?;
                }
                handle.close_stdin();
                Ok::<(), Error>(())
            };
            let drain = async {
                while let Some(event) = events.next().await {
                    let Some(line) = event.data else { continue };
                    match event.event_type {
                        ProcessEventType::Stdout => {
                            on_line(StreamKind::Stdout, trim_line_ending(&line));
                            stdout.push_str(&line);
                        }
                        ProcessEventType::Stderr => {
                            on_line(StreamKind::Stderr, trim_line_ending(&line));
                            stderr.push_str(&line);
                        }
                        ProcessEventType::Started { .. } => {}
                    }
                }
            };
            let (fed, ()) = futures_lite::future::zip(feed, drain).await;
            fed?;
            handle.wait().await
        };

        match timeout {
            Some(limit) => {
                futures_lite::future::or(async { Some(work.await) }, async {
                    async_io::Timer::after(limit).await;
                    None
                })
                .await
            }
            None => Some(work.await),
        }
    };

    let status = match finished {
        Some(status) => status?,
        None => {
            if let Err(e) = handle.kill().await {
                tracing::warn!(command = %description, error = %e, "failed to kill timed out process");
            }
            return Err(Error::Timeout {
                command: description,
                timeout: timeout.unwrap_or_default(),
            });
        }
    };

    Ok(ProcessOutput {
        stdout,
        stderr,
        status,
    })
}

/// Drop one trailing `\n` and then one trailing `\r`
pub fn trim_line_ending(line: &str) -> &str {
    let line = line.strip_suffix('\n').unwrap_or(line);
    line.strip_suffix('\r').unwrap_or(line)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exit_status_success() {
        assert!(ExitStatus::from_code(0).success());
        assert!(!ExitStatus::from_code(3).success());
        assert_eq!(ExitStatus::from_code(3).code_or_failure(), 3);
    }

    #[test]
    fn test_signal_exit_maps_to_failure() {
        let status = ExitStatus {
            code: None,
            #[cfg(unix)]
            signal: Some(9),
        };
        assert!(!status.success());
        assert_eq!(status.code_or_failure(), -1);
    }

    #[test]
    fn test_trim_line_ending() {
        assert_eq!(trim_line_ending("plain\n"), "plain");
        assert_eq!(trim_line_ending("crlf\r\n"), "crlf");
        assert_eq!(trim_line_ending("[exit_code:0]"), "[exit_code:0]");
        assert_eq!(trim_line_ending("\n"), "");
        assert_eq!(trim_line_ending("two\n\n"), "two\n");
    }
}
