//! Error types for remote execution

use std::time::Duration;
use thiserror::Error;

use crate::sentinel::TRANSPORT_FAILURE;

/// Unified error type for remote command execution and transfers
#[derive(Error, Debug)]
pub enum Error {
    /// Invalid host or engine configuration, e.g. a control path that cannot
    /// be shortened below the socket path limit
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Failed to spawn a process
    #[error("failed to spawn process: {reason}")]
    SpawnFailed {
        /// The reason for the spawn failure
        reason: String,
    },

    /// The process did not finish within its configured timeout
    #[error("`{command}` timed out after {timeout:?}")]
    Timeout {
        /// The invocation that timed out
        command: String,
        /// The timeout that was exceeded
        timeout: Duration,
    },

    /// A remote command reported a non-zero exit status
    #[error("command `{command}` failed on {hostname} with exit status {exit_status}")]
    RemoteCommand {
        /// Host the command ran on
        hostname: String,
        /// The command text as given by the caller
        command: String,
        /// Decoded exit status, `-1` if the transport ended before reporting one
        exit_status: i32,
        /// Standard output with the exit-status sentinel removed
        output: String,
        /// Raw standard error
        error_output: String,
    },

    /// rsync exited with a non-zero status
    #[error("transfer to {hostname} failed with exit code {exit_code}: {error_output}")]
    Transfer {
        /// Host label of the remote side
        hostname: String,
        /// Exit code of rsync, `-1` if it was terminated by a signal
        exit_code: i32,
        /// Raw standard error of rsync
        error_output: String,
    },

    /// I/O error
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// Settings file could not be parsed
    #[error(transparent)]
    Yaml(#[from] serde_yaml::Error),
}

impl Error {
    /// Create a spawn failed error
    pub fn spawn_failed(reason: impl Into<String>) -> Self {
        Self::SpawnFailed {
            reason: reason.into(),
        }
    }

    /// Create a configuration error
    pub fn configuration(reason: impl Into<String>) -> Self {
        Self::Configuration(reason.into())
    }

    /// Exit status carried by a [`Error::RemoteCommand`] or [`Error::Transfer`]
    pub fn exit_status(&self) -> Option<i32> {
        match self {
            Error::RemoteCommand { exit_status, .. } => Some(*exit_status),
            Error::Transfer { exit_code, .. } => Some(*exit_code),
            _ => None,
        }
    }

    /// True when the remote shell never reported a status, meaning the
    /// connection dropped or ssh exited before the command completed
    pub fn is_transport_failure(&self) -> bool {
        matches!(
            self,
            Error::RemoteCommand { exit_status, .. } if *exit_status == TRANSPORT_FAILURE
        )
    }

    /// True for [`Error::Timeout`]
    pub fn is_timeout(&self) -> bool {
        matches!(self, Error::Timeout { .. })
    }
}

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;
