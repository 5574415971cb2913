//! Error locator: maps a failure back to a line of the submitted snippet.
//!
//! Best effort, not a source map. Steps run in order and the first hit wins:
//!
//! 1. A `line:column` marker in the trace text. `<anonymous>:L:C` is preferred,
//!    then the first generic `:L:C`, then the engine's own `line L, col C`
//!    form. The prologue is subtracted to land in snippet coordinates.
//! 2. An "`x` is not defined" message: the first snippet line containing `x`.
//!    Repeated identifiers are not disambiguated.
//! 3. Nothing.

use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::transform::TransformedSource;

/// A 1-based line in the original snippet plus its trimmed text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorLocation {
    pub line: usize,
    pub line_content: Option<String>,
}

fn anonymous_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"<anonymous>:(\d+):(\d+)").expect("valid regex"))
}

fn generic_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r":(\d+):(\d+)").expect("valid regex"))
}

fn engine_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)\bline (\d+), col(?:umn)? (\d+)").expect("valid regex"))
}

fn not_defined_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r#"['"]?([A-Za-z_$][A-Za-z0-9_$]*)['"]? is not defined"#).expect("valid regex")
    })
}

/// Locates failures for one transformed snippet.
#[derive(Debug, Clone, Copy)]
pub struct ErrorLocator<'a> {
    original: &'a str,
}

impl<'a> ErrorLocator<'a> {
    pub fn new(source: &'a TransformedSource) -> Self {
        Self::for_original(source.original())
    }

    /// Locator over raw snippet text, for callers that never built a script.
    pub fn for_original(original: &'a str) -> Self {
        Self { original }
    }

    pub fn locate(&self, message: &str, stack: Option<&str>) -> Option<ErrorLocation> {
        stack
            .and_then(|trace| self.from_trace(trace))
            .or_else(|| self.from_undefined_identifier(message))
    }

    fn from_trace(&self, trace: &str) -> Option<ErrorLocation> {
        let raw_line = [anonymous_re(), generic_re(), engine_re()]
            .into_iter()
            .find_map(|re| re.captures(trace))
            .and_then(|caps| caps[1].parse::<usize>().ok())?;

        let line = TransformedSource::user_line(raw_line);
        let line_content = self
            .original
            .split('\n')
            .nth(line - 1)
            .map(|text| text.trim().to_string());
        Some(ErrorLocation { line, line_content })
    }

    fn from_undefined_identifier(&self, message: &str) -> Option<ErrorLocation> {
        let caps = not_defined_re().captures(message)?;
        let ident = &caps[1];
        self.original
            .split('\n')
            .enumerate()
            .find(|(_, text)| text.contains(ident))
            .map(|(idx, text)| ErrorLocation {
                line: idx + 1,
                line_content: Some(text.trim().to_string()),
            })
    }
}

/// First trace line that points into the anonymous user function.
pub fn first_frame(stack: Option<&str>) -> Option<String> {
    stack?
        .lines()
        .find(|line| line.contains("<anonymous>"))
        .map(str::to_string)
}
