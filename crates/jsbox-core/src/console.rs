//! Host side of the console capture shim.
//!
//! The in-context half lives in [`crate::sandbox::prelude`]; it formats each
//! `console.*` call and posts it to the host. This half keeps the ordered
//! buffer for one invocation, pushes each entry to an optional observer as it
//! arrives, and forwards it to the host log.

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc::UnboundedSender;

use crate::sandbox::outcome::InvocationId;

/// Console method that produced a log line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogLevel {
    Log,
    Info,
    Warn,
    Error,
}

impl LogLevel {
    pub const ALL: [LogLevel; 4] = [LogLevel::Log, LogLevel::Info, LogLevel::Warn, LogLevel::Error];

    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Log => "log",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        }
    }
}

impl std::fmt::Display for LogLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One formatted console line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogEntry {
    pub level: LogLevel,
    pub text: String,
}

impl LogEntry {
    pub fn new(level: LogLevel, text: impl Into<String>) -> Self {
        Self {
            level,
            text: text.into(),
        }
    }
}

/// Ordered log buffer owned by a single invocation.
///
/// Unbounded: nothing here truncates.
#[derive(Debug)]
pub struct ConsoleCapture {
    invocation_id: InvocationId,
    entries: Vec<LogEntry>,
    observer: Option<UnboundedSender<LogEntry>>,
}

impl ConsoleCapture {
    pub fn new(invocation_id: InvocationId) -> Self {
        Self {
            invocation_id,
            entries: Vec::new(),
            observer: None,
        }
    }

    /// Stream every entry to `observer` as well as buffering it.
    pub fn with_observer(mut self, observer: UnboundedSender<LogEntry>) -> Self {
        self.observer = Some(observer);
        self
    }

    /// Append an entry, notify the observer, then forward to the host log.
    pub fn push(&mut self, entry: LogEntry) {
        if let Some(observer) = &self.observer {
            // A dropped receiver only means nobody is watching any more.
            if observer.send(entry.clone()).is_err() {
                self.observer = None;
            }
        }
        tracing::debug!(
            target: "jsbox::console",
            invocation_id = %self.invocation_id,
            level = %entry.level,
            text = %entry.text,
        );
        self.entries.push(entry);
    }

    pub fn entries(&self) -> &[LogEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Consume the capture, yielding entries in arrival order.
    pub fn into_entries(self) -> Vec<LogEntry> {
        self.entries
    }
}
