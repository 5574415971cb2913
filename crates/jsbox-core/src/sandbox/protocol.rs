//! Wire protocol between the host and a worker process.
//!
//! The host writes one [`WorkerRequest`] as JSON to the worker's stdin and
//! closes it. The worker answers with newline-delimited [`Envelope`]s on
//! stdout: any number of `log` messages followed by at most one terminal
//! `done` or `error`.

use serde::{Deserialize, Serialize};

use crate::console::LogLevel;
use crate::sandbox::outcome::InvocationId;

/// The single request a worker serves.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkerRequest {
    pub id: InvocationId,
    pub script: String,
}

/// A message posted from inside the isolated context.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum WorkerMessage {
    Log {
        level: LogLevel,
        text: String,
    },
    Done {
        /// `JSON.stringify` of the value, absent when it has no JSON form.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        json: Option<String>,
        /// `String(value)`, set only when `JSON.stringify` threw.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        text: Option<String>,
    },
    Error {
        message: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        stack: Option<String>,
    },
}

/// One stdout line from a worker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Envelope {
    pub id: InvocationId,
    pub message: WorkerMessage,
}

impl Envelope {
    /// Encode as a single line (no trailing newline).
    pub fn to_line(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }

    pub fn from_line(line: &str) -> serde_json::Result<Self> {
        serde_json::from_str(line.trim_end())
    }
}
