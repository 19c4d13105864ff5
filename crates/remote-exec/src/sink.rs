//! Live output display
//!
//! Executors hand every non-empty output line to an [`OutputSink`] together
//! with the host it came from, so lines from concurrent runs against different
//! hosts stay attributable when they interleave.

use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::error::Error;
use crate::event::StreamKind;

/// ANSI style applied to stderr lines when decoration is on
const ERROR_STYLE: &str = "\x1b[31m";
const RESET_STYLE: &str = "\x1b[0m";

/// How much the caller wants to see
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Verbosity {
    /// Nothing but errors
    Quiet,
    /// Normal output
    #[default]
    Normal,
    /// `-v`
    Verbose,
    /// `-vv`: announce each command before it runs
    VeryVerbose,
    /// `-vvv`: stream remote output live
    Debug,
}

/// Accepts the level names (`quiet`, `normal`, `verbose`, `very_verbose`,
/// `debug`) or a count of `-v` flags from 0 to 3
impl FromStr for Verbosity {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "quiet" => Ok(Verbosity::Quiet),
            "normal" | "0" => Ok(Verbosity::Normal),
            "verbose" | "1" => Ok(Verbosity::Verbose),
            "very_verbose" | "2" => Ok(Verbosity::VeryVerbose),
            "debug" | "3" => Ok(Verbosity::Debug),
            other => Err(Error::configuration(format!("unknown verbosity `{other}`"))),
        }
    }
}

/// Consumer of host-tagged output lines
pub trait OutputSink: Send + Sync {
    /// Display one line of output from `host`
    fn write_line(&self, host: &str, stream: StreamKind, text: &str);

    /// Whether remote output should be streamed live
    fn is_debug(&self) -> bool {
        false
    }

    /// Whether each command should be announced before it runs
    fn is_very_verbose(&self) -> bool {
        false
    }

    /// Whether output may carry ANSI styling
    fn is_decorated(&self) -> bool {
        false
    }
}

/// Discards everything
#[derive(Debug, Clone, Copy, Default)]
pub struct NullSink;

impl OutputSink for NullSink {
    fn write_line(&self, _host: &str, _stream: StreamKind, _text: &str) {}
}

/// Prints `[host] line` to the terminal, stderr lines to stderr
///
/// At [`Verbosity::Quiet`] only stderr lines are printed.
#[derive(Debug, Clone, Copy, Default)]
pub struct ConsoleSink {
    verbosity: Verbosity,
    decorated: bool,
}

impl ConsoleSink {
    /// Create a console sink
    pub fn new(verbosity: Verbosity, decorated: bool) -> Self {
        Self {
            verbosity,
            decorated,
        }
    }

    /// Whether lines from `stream` reach the terminal
    pub fn shows(&self, stream: StreamKind) -> bool {
        stream == StreamKind::Stderr || self.verbosity > Verbosity::Quiet
    }
}

impl OutputSink for ConsoleSink {
    fn write_line(&self, host: &str, stream: StreamKind, text: &str) {
        if !self.shows(stream) {
            return;
        }
        let line = render_line(host, stream, text, self.decorated);
        match stream {
            StreamKind::Stdout => println!("{line}"),
            StreamKind::Stderr => eprintln!("{line}"),
        }
    }

    fn is_debug(&self) -> bool {
        self.verbosity >= Verbosity::Debug
    }

    fn is_very_verbose(&self) -> bool {
        self.verbosity >= Verbosity::VeryVerbose
    }

    fn is_decorated(&self) -> bool {
        self.decorated
    }
}

/// Forwards lines as `tracing` events, stdout at info and stderr at warn
///
/// Useful when the embedding program already routes everything through a
/// subscriber and wants remote output in the same log.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink {
    verbosity: Verbosity,
}

impl TracingSink {
    /// Create a tracing sink
    pub fn new(verbosity: Verbosity) -> Self {
        Self { verbosity }
    }
}

impl OutputSink for TracingSink {
    fn write_line(&self, host: &str, stream: StreamKind, text: &str) {
        match stream {
            StreamKind::Stdout => tracing::info!(host, "{text}"),
            StreamKind::Stderr => tracing::warn!(host, "{text}"),
        }
    }

    fn is_debug(&self) -> bool {
        self.verbosity >= Verbosity::Debug
    }

    fn is_very_verbose(&self) -> bool {
        self.verbosity >= Verbosity::VeryVerbose
    }
}

/// Format a line as `[host] text`, styling stderr when `decorated`
pub fn render_line(host: &str, stream: StreamKind, text: &str, decorated: bool) -> String {
    match stream {
        StreamKind::Stderr if decorated => format!("[{host}] {ERROR_STYLE}{text}{RESET_STYLE}"),
        _ => format!("[{host}] {text}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_plain() {
        assert_eq!(
            render_line("web1", StreamKind::Stderr, "oops", false),
            "[web1] oops"
        );
        assert_eq!(
            render_line("web1", StreamKind::Stdout, "ok", true),
            "[web1] ok"
        );
    }

    #[test]
    fn test_render_decorated_stderr() {
        let line = render_line("web1", StreamKind::Stderr, "oops", true);
        assert_eq!(line, "[web1] \x1b[31moops\x1b[0m");
    }

    #[test]
    fn test_console_sink_levels() {
        let sink = ConsoleSink::new(Verbosity::VeryVerbose, false);
        assert!(sink.is_very_verbose());
        assert!(!sink.is_debug());

        let sink = ConsoleSink::new(Verbosity::Debug, true);
        assert!(sink.is_very_verbose());
        assert!(sink.is_debug());
        assert!(sink.is_decorated());
    }

    #[test]
    fn test_quiet_console_only_shows_errors() {
        let quiet = ConsoleSink::new(Verbosity::Quiet, false);
        assert!(!quiet.shows(StreamKind::Stdout));
        assert!(quiet.shows(StreamKind::Stderr));

        let normal = ConsoleSink::new(Verbosity::Normal, false);
        assert!(normal.shows(StreamKind::Stdout));
        assert!(normal.shows(StreamKind::Stderr));
    }

    #[test]
    fn test_verbosity_from_str() {
        assert_eq!("debug".parse::<Verbosity>().unwrap(), Verbosity::Debug);
        assert_eq!(" 2 ".parse::<Verbosity>().unwrap(), Verbosity::VeryVerbose);
        assert_eq!("Quiet".parse::<Verbosity>().unwrap(), Verbosity::Quiet);
        assert!("loud".parse::<Verbosity>().is_err());
    }

    #[test]
    fn test_tracing_sink_is_never_decorated() {
        let sink = TracingSink::new(Verbosity::Debug);
        assert!(sink.is_debug());
        assert!(!sink.is_decorated());
        assert!(!TracingSink::default().is_very_verbose());
    }

    #[test]
    fn test_null_sink_is_silent() {
        let sink = NullSink;
        assert!(!sink.is_debug());
        assert!(!sink.is_very_verbose());
        sink.write_line("web1", StreamKind::Stdout, "ignored");
    }
}
