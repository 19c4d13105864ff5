//! Raw process events and line filtering

use std::borrow::Cow;

/// A raw event from a process
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessEvent {
    /// The type of event
    pub event_type: ProcessEventType,
    /// Optional data associated with the event; output lines keep their terminator
    pub data: Option<String>,
}

impl ProcessEvent {
    /// Create a new process event
    pub fn new(event_type: ProcessEventType) -> Self {
        Self {
            event_type,
            data: None,
        }
    }

    /// Create a new process event with data
    pub fn new_with_data(event_type: ProcessEventType, data: String) -> Self {
        Self {
            event_type,
            data: Some(data),
        }
    }

    /// A stdout line event
    pub fn stdout(line: impl Into<String>) -> Self {
        Self::new_with_data(ProcessEventType::Stdout, line.into())
    }

    /// A stderr line event
    pub fn stderr(line: impl Into<String>) -> Self {
        Self::new_with_data(ProcessEventType::Stderr, line.into())
    }

    /// Stream the event's line came from, if it carries one
    pub fn stream(&self) -> Option<StreamKind> {
        match self.event_type {
            ProcessEventType::Stdout => Some(StreamKind::Stdout),
            ProcessEventType::Stderr => Some(StreamKind::Stderr),
            ProcessEventType::Started { .. } => None,
        }
    }
}

/// Types of raw process events
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessEventType {
    /// Process has started
    Started {
        /// OS process id
        pid: u32,
    },
    /// Line from stdout
    Stdout,
    /// Line from stderr
    Stderr,
}

/// Which output stream a line came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StreamKind {
    /// Standard output
    Stdout,
    /// Standard error
    Stderr,
}

/// Filter for lines on their way to an output sink
pub trait LogFilter: Send + Sync {
    /// Filter a line, returning None to drop it
    fn filter<'a>(&self, line: &'a str, source: StreamKind) -> Option<Cow<'a, str>>;
}

/// Drops empty lines and passes everything else through untouched
#[derive(Debug, Clone, Copy, Default)]
pub struct SkipEmpty;

impl LogFilter for SkipEmpty {
    fn filter<'a>(&self, line: &'a str, _source: StreamKind) -> Option<Cow<'a, str>> {
        if line.is_empty() {
            None
        } else {
            Some(Cow::Borrowed(line))
        }
    }
}
