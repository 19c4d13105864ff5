//! Exit-status sentinel carried in-band on a remote shell's stdout
//!
//! `ssh` only hands back one interleaved output stream, and when a batch script
//! is piped into `bash -s` the script's own exit status is lost once the
//! session closes. The remote side therefore prints a marker after the script
//! finishes:
//!
//! ```text
//! [exit_code:<status>]
//! ```
//!
//! [`remote_script`] builds the remote command that emits it and [`decode`]
//! recovers the status and the real output. A missing marker decodes to
//! [`TRANSPORT_FAILURE`]: the connection went away before the shell could
//! report. The token is chosen to be unlikely in ordinary output; it is not
//! collision-proof.

use regex::Regex;
use std::borrow::Cow;
use std::sync::LazyLock;

use crate::event::{LogFilter, StreamKind};

/// Version of the sentinel wire format
pub const SENTINEL_VERSION: u32 = 1;

/// Text that opens every sentinel
pub const SENTINEL_PREFIX: &str = "[exit_code:";

/// `printf` format the remote shell uses to emit the sentinel
pub const SENTINEL_FORMAT: &str = "[exit_code:%s]";

/// Pattern matching one sentinel; the capture is the reported status
pub const SENTINEL_PATTERN: &str = r"\[exit_code:(.*?)\]";

/// Status reported when no sentinel was found
pub const TRANSPORT_FAILURE: i32 = -1;

static SENTINEL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(SENTINEL_PATTERN).expect("sentinel pattern is valid"));

/// Remote command that runs stdin through `shell` and then prints the sentinel
///
/// ```
/// assert_eq!(
///     remote_exec::sentinel::remote_script("bash -s"),
///     "bash -s; printf \"[exit_code:%s]\" $?;"
/// );
/// ```
pub fn remote_script(shell: &str) -> String {
    format!("{shell}; printf \"{SENTINEL_FORMAT}\" $?;")
}

/// The exact text the remote `printf` produces for `status`
pub fn encode(status: i32) -> String {
    SENTINEL_FORMAT.replace("%s", &status.to_string())
}

/// Output and status recovered from a batch run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Decoded {
    /// Stdout with every sentinel removed
    pub output: String,
    /// Reported exit status, or [`TRANSPORT_FAILURE`]
    pub exit_status: i32,
}

/// Split the sentinel out of a batch run's stdout
///
/// The last match is authoritative since the marker is printed after
/// everything the command wrote.
pub fn decode(stdout: &str) -> Decoded {
    let exit_status = SENTINEL
        .captures_iter(stdout)
        .last()
        .and_then(|caps| caps.get(1))
        .and_then(|status| status.as_str().trim().parse::<i32>().ok())
        .unwrap_or(TRANSPORT_FAILURE);

    Decoded {
        output: strip(stdout).into_owned(),
        exit_status,
    }
}

/// Remove every sentinel from `text`
pub fn strip(text: &str) -> Cow<'_, str> {
    SENTINEL.replace_all(text, "")
}

/// Filter for streamed lines: strips the sentinel, then drops lines left empty
#[derive(Debug, Clone, Copy, Default)]
pub struct SentinelFilter;

impl LogFilter for SentinelFilter {
    fn filter<'a>(&self, line: &'a str, _source: StreamKind) -> Option<Cow<'a, str>> {
        let stripped = strip(line);
        if stripped.is_empty() {
            None
        } else {
            Some(stripped)
        }
    }
}
