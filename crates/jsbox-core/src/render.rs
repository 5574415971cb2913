//! Result serializer and outcome rendering.
//!
//! `render_value` turns a completion value into caller-facing text.
//! `render_outcome` builds the single text block handed back to the agent:
//! logs first, then the result or the error.

use crate::sandbox::outcome::{CompletionValue, Failure, Outcome};

/// Placeholder used when an invocation produced nothing at all.
pub const NO_OUTPUT: &str = "(no output)";

/// Render a completion value.
///
/// Strings are returned verbatim; other structured values are pretty printed
/// with two-space indentation. `None` means there is no result to show.
pub fn render_value(value: &CompletionValue) -> Option<String> {
    match value {
        CompletionValue::Undefined => None,
        CompletionValue::Json(serde_json::Value::String(s)) => Some(s.clone()),
        CompletionValue::Json(json) => {
            Some(serde_json::to_string_pretty(json).unwrap_or_else(|_| json.to_string()))
        }
        CompletionValue::Opaque(text) => Some(text.clone()),
    }
}

/// Render an outcome as one text block.
pub fn render_outcome(outcome: &Outcome) -> String {
    let mut combined = outcome
        .logs()
        .iter()
        .map(|entry| entry.text.as_str())
        .collect::<Vec<_>>()
        .join("\n");

    let result = outcome.result_text();
    let failure = outcome.failure();

    if !combined.is_empty() && (result.is_some() || failure.is_some()) {
        combined.push('\n');
    }

    if let Some(failure) = failure {
        combined.push_str(&render_failure(failure));
    } else if let Some(result) = result {
        combined.push_str(&result);
    } else if combined.is_empty() {
        combined.push_str(NO_OUTPUT);
    }

    combined
}

fn render_failure(failure: &Failure) -> String {
    let Some(line) = failure.line else {
        let mut text = format!("Error: {}", failure.message);
        if let Some(frame) = &failure.frame {
            text.push_str(&format!("\nFrame: {frame}"));
        } else if let Some(stack) = &failure.stack {
            text.push_str(&format!("\nStack: {stack}"));
        }
        return text;
    };

    match failure
        .line_content
        .as_deref()
        .map(str::trim)
        .filter(|content| !content.is_empty())
    {
        Some(content) => format!("Error (line {line}: {content}): {}", failure.message),
        None => format!("Error (line {line}): {}", failure.message),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::console::{LogEntry, LogLevel};
    use crate::sandbox::outcome::Completion;
    use serde_json::json;

    fn completed(value: CompletionValue, logs: &[&str]) -> Outcome {
        Outcome::Completed(Completion {
            value,
            logs: logs
                .iter()
                .map(|t| LogEntry::new(LogLevel::Log, *t))
                .collect(),
        })
    }

    #[test]
    fn test_string_is_verbatim() {
        assert_eq!(
            render_value(&CompletionValue::Json(json!("hi\nthere"))).as_deref(),
            Some("hi\nthere")
        );
    }

    #[test]
    fn test_structured_values_are_pretty_printed() {
        assert_eq!(
            render_value(&CompletionValue::Json(json!(42))).as_deref(),
            Some("42")
        );
        assert_eq!(
            render_value(&CompletionValue::Json(json!({"b": 1, "a": [true, null]}))).as_deref(),
            Some("{\n  \"b\": 1,\n  \"a\": [\n    true,\n    null\n  ]\n}")
        );
    }

    #[test]
    fn test_opaque_and_undefined() {
        assert_eq!(
            render_value(&CompletionValue::Opaque("[object Object]".into())).as_deref(),
            Some("[object Object]")
        );
        assert!(render_value(&CompletionValue::Undefined).is_none());
    }

    #[test]
    fn test_logs_then_result() {
        let outcome = completed(CompletionValue::Json(json!(1)), &["a", "b"]);
        assert_eq!(render_outcome(&outcome), "a\nb\n1");
    }

    #[test]
    fn test_logs_without_result() {
        let outcome = completed(CompletionValue::Undefined, &["only log"]);
        assert_eq!(render_outcome(&outcome), "only log");
    }

    #[test]
    fn test_no_output_placeholder() {
        let outcome = completed(CompletionValue::Undefined, &[]);
        assert_eq!(render_outcome(&outcome), NO_OUTPUT);
    }

    #[test]
    fn test_empty_string_result_is_still_a_result() {
        let outcome = completed(CompletionValue::Json(json!("")), &["x"]);
        assert_eq!(render_outcome(&outcome), "x\n");
    }

    #[test]
    fn test_error_with_line_and_content() {
        let mut failure = Failure::fault("foo is not defined", vec![]);
        failure.line = Some(3);
        failure.line_content = Some("  foo(b);  ".into());
        assert_eq!(
            render_outcome(&Outcome::Failed(failure)),
            "Error (line 3: foo(b);): foo is not defined"
        );
    }

    #[test]
    fn test_error_with_line_but_no_content() {
        let mut failure = Failure::fault("boom", vec![LogEntry::new(LogLevel::Warn, "w")]);
        failure.line = Some(9);
        assert_eq!(
            render_outcome(&Outcome::Failed(failure)),
            "w\nError (line 9): boom"
        );
    }

    #[test]
    fn test_error_without_line_prefers_frame_over_stack() {
        let mut failure = Failure::fault("boom", vec![]);
        failure.stack = Some("Error: boom\n  at <anonymous>:1:1".into());
        failure.frame = Some("  at <anonymous>:1:1".into());
        assert_eq!(
            render_outcome(&Outcome::Failed(failure.clone())),
            "Error: boom\nFrame:   at <anonymous>:1:1"
        );

        failure.frame = None;
        assert_eq!(
            render_outcome(&Outcome::Failed(failure)),
            "Error: boom\nStack: Error: boom\n  at <anonymous>:1:1"
        );
    }

    #[test]
    fn test_timeout_renders_with_logs() {
        let outcome = Outcome::Failed(Failure::timeout(vec![LogEntry::new(
            LogLevel::Log,
            "started",
        )]));
        assert_eq!(render_outcome(&outcome), "started\nError: Timed out");
    }
}
