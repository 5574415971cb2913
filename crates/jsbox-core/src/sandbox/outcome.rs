//! Invocation and outcome types.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::console::LogEntry;

/// Default wall-clock budget for one invocation.
pub const DEFAULT_TIMEOUT_MS: u64 = 5_000;

/// Message reported when the deadline wins the race.
pub const TIMEOUT_MESSAGE: &str = "Timed out";

/// Monotonic identity used to correlate worker messages with an invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct InvocationId(u64);

impl InvocationId {
    pub fn new(raw: u64) -> Self {
        Self(raw)
    }

    pub fn get(&self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for InvocationId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "inv-{}", self.0)
    }
}

/// One request to execute a snippet. Immutable once started.
#[derive(Debug, Clone)]
pub struct Invocation {
    id: InvocationId,
    code: String,
    timeout: Duration,
    submitted_at: DateTime<Utc>,
}

impl Invocation {
    pub fn new(id: InvocationId, code: impl Into<String>, timeout: Duration) -> Self {
        Self {
            id,
            code: code.into(),
            timeout,
            submitted_at: Utc::now(),
        }
    }

    pub fn id(&self) -> InvocationId {
        self.id
    }

    pub fn code(&self) -> &str {
        &self.code
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn submitted_at(&self) -> DateTime<Utc> {
        self.submitted_at
    }
}

/// The value a snippet evaluated to, as transported out of the context.
///
/// Serialize-only: numbers keep their exact JSON text, which the tagged
/// deserializers cannot carry.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum CompletionValue {
    /// No structured form exists (`undefined`, functions, symbols).
    Undefined,
    /// Structured value, decoded from the context's JSON text.
    Json(serde_json::Value),
    /// Plain string coercion used when structured serialization threw.
    Opaque(String),
}

/// Successful terminal state.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Completion {
    pub value: CompletionValue,
    pub logs: Vec<LogEntry>,
}

/// Why an invocation failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// The code failed to compile, threw, rejected, or crashed its context.
    Fault,
    /// The deadline elapsed first.
    Timeout,
}

/// Failed terminal state, with whatever location could be recovered.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Failure {
    pub kind: FailureKind,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stack: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub line: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub line_content: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub frame: Option<String>,
    pub logs: Vec<LogEntry>,
}

impl Failure {
    pub fn timeout(logs: Vec<LogEntry>) -> Self {
        Self {
            kind: FailureKind::Timeout,
            message: TIMEOUT_MESSAGE.to_string(),
            stack: None,
            line: None,
            line_content: None,
            frame: None,
            logs,
        }
    }

    pub fn fault(message: impl Into<String>, logs: Vec<LogEntry>) -> Self {
        Self {
            kind: FailureKind::Fault,
            message: message.into(),
            stack: None,
            line: None,
            line_content: None,
            frame: None,
            logs,
        }
    }
}

/// Terminal result of one invocation. Exactly one is produced per invocation.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Outcome {
    Completed(Completion),
    Failed(Failure),
}

impl Outcome {
    pub fn logs(&self) -> &[LogEntry] {
        match self {
            Outcome::Completed(c) => &c.logs,
            Outcome::Failed(f) => &f.logs,
        }
    }

    pub fn is_completed(&self) -> bool {
        matches!(self, Outcome::Completed(_))
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, Outcome::Failed(f) if f.kind == FailureKind::Timeout)
    }

    pub fn failure(&self) -> Option<&Failure> {
        match self {
            Outcome::Failed(f) => Some(f),
            Outcome::Completed(_) => None,
        }
    }

    /// Caller-facing text of the completion value, if there is one.
    pub fn result_text(&self) -> Option<String> {
        match self {
            Outcome::Completed(c) => crate::render::render_value(&c.value),
            Outcome::Failed(_) => None,
        }
    }

    /// Short label used in logs and metrics.
    pub fn status_label(&self) -> &'static str {
        match self {
            Outcome::Completed(_) => "completed",
            Outcome::Failed(f) if f.kind == FailureKind::Timeout => "timed_out",
            Outcome::Failed(_) => "failed",
        }
    }
}
