//! Source transformer: gives a snippet an implicit result.
//!
//! Agents tend to write snippets the way they would type into a REPL, ending
//! with a bare expression or a declaration. The engine runs the snippet as a
//! function body, so the trailing statement is rewritten into a `return`.
//!
//! The rewrite is a line-based heuristic, not a parse. Known gaps:
//! - `const a = 1, b = 2` only returns `a`.
//! - A trailing comment line is treated as an expression and will usually
//!   produce a syntax error.

use std::sync::OnceLock;

use regex::Regex;

/// Sentinel comment emitted on the line before user code.
pub const USER_CODE_START: &str = "__USER_CODE_START__";

/// Sentinel comment emitted on the line after user code.
pub const USER_CODE_END: &str = "__USER_CODE_END__";

/// Global the prelude installs to receive the wrapper's promise.
pub const SETTLE_FN: &str = "__jsbox_settle";

/// Number of script lines ahead of the first user line.
pub const PROLOGUE_LINES: usize = 3;

fn return_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^return(?:[^A-Za-z0-9_]|$)").expect("valid regex"))
}

fn declaration_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^(?:const|let|var)\s+([A-Za-z_$][A-Za-z0-9_$]*)").expect("valid regex")
    })
}

/// Rewrite `code` so its last statement becomes the function's return value.
///
/// Returns the input unchanged when it is blank, already returns, or ends in
/// something that looks like a block.
pub fn transform_snippet(code: &str) -> String {
    let mut lines: Vec<String> = code.split('\n').map(str::to_string).collect();
    let Some(last) = lines.iter().rposition(|line| !line.trim().is_empty()) else {
        return code.to_string();
    };

    let trimmed = lines[last].trim().to_string();

    if return_re().is_match(&trimmed) {
        return code.to_string();
    }

    if trimmed.starts_with(['}', ']', ')']) || trimmed.ends_with('{') || trimmed.ends_with("};") {
        return code.to_string();
    }

    if let Some(caps) = declaration_re().captures(&trimmed) {
        lines.push(format!("return {};", &caps[1]));
        return lines.join("\n");
    }

    let expr = trimmed.strip_suffix(';').unwrap_or(&trimmed);
    lines[last] = format!("return ({expr});");
    lines.join("\n")
}

/// A snippet rewritten and wrapped for one invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransformedSource {
    original: String,
    executable: String,
    script: String,
}

impl TransformedSource {
    pub fn new(code: &str) -> Self {
        let executable = transform_snippet(code);
        // Keep the line count ahead of `executable` equal to PROLOGUE_LINES.
        let script = format!(
            "{SETTLE_FN}((async function () {{\n\"use strict\";\n// {USER_CODE_START}\n{executable}\n// {USER_CODE_END}\n}})());"
        );
        Self {
            original: code.to_string(),
            executable,
            script,
        }
    }

    /// The snippet exactly as submitted.
    pub fn original(&self) -> &str {
        &self.original
    }

    /// The snippet after the implicit-return rewrite.
    pub fn executable(&self) -> &str {
        &self.executable
    }

    /// The full script handed to the isolated context.
    pub fn script(&self) -> &str {
        &self.script
    }

    /// Map a 1-based script line to a 1-based line of the original snippet.
    pub fn user_line(raw_line: usize) -> usize {
        raw_line.saturating_sub(PROLOGUE_LINES).max(1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bare_expression_is_returned() {
        assert_eq!(transform_snippet("1 + 1"), "return (1 + 1);");
    }

    #[test]
    fn test_trailing_semicolon_is_stripped() {
        assert_eq!(
            transform_snippet("const a = 2;\na * 3;"),
            "const a = 2;\nreturn (a * 3);"
        );
    }

    #[test]
    fn test_declaration_appends_return_of_identifier() {
        assert_eq!(
            transform_snippet("const x = 21 * 2;"),
            "const x = 21 * 2;\nreturn x;"
        );
        assert_eq!(transform_snippet("let $val = 1"), "let $val = 1\nreturn $val;");
        assert_eq!(transform_snippet("var _n=3;"), "var _n=3;\nreturn _n;");
    }

    #[test]
    fn test_multi_declaration_only_returns_first() {
        assert_eq!(
            transform_snippet("const a = 1, b = 2;"),
            "const a = 1, b = 2;\nreturn a;"
        );
    }

    #[test]
    fn test_explicit_return_is_untouched() {
        let code = "const a = 1;\nreturn a + 1;";
        assert_eq!(transform_snippet(code), code);
        assert_eq!(transform_snippet("return"), "return");
    }

    #[test]
    fn test_transform_is_idempotent_after_return() {
        let once = transform_snippet("[1, 2].map((n) => n * 2)");
        assert_eq!(transform_snippet(&once), once);
    }

    #[test]
    fn test_identifier_starting_with_return_is_an_expression() {
        assert_eq!(transform_snippet("returnValue"), "return (returnValue);");
    }

    #[test]
    fn test_block_endings_are_untouched() {
        for code in [
            "function f() {\n  return 1;\n}",
            "if (x) {",
            "const o = {\n  a: 1,\n};",
            "foo(\n  1\n)",
            "const xs = [\n  1,\n]",
        ] {
            assert_eq!(transform_snippet(code), code, "changed: {code}");
        }
    }

    #[test]
    fn test_trailing_blank_lines_are_skipped() {
        assert_eq!(
            transform_snippet("const a = 1;\na\n\n   \n"),
            "const a = 1;\nreturn (a);\n\n   \n"
        );
    }

    #[test]
    fn test_blank_input_is_unchanged() {
        assert_eq!(transform_snippet(""), "");
        assert_eq!(transform_snippet("  \n\t\n"), "  \n\t\n");
    }

    #[test]
    fn test_trailing_comment_falls_through_to_expression() {
        assert_eq!(transform_snippet("1\n// done"), "1\nreturn (// done);");
    }

    #[test]
    fn test_indentation_is_dropped_from_rewritten_line() {
        assert_eq!(transform_snippet("    total"), "return (total);");
    }

    #[test]
    fn test_script_wraps_with_fixed_prologue() {
        let src = TransformedSource::new("1 + 1");
        let lines: Vec<&str> = src.script().lines().collect();
        assert_eq!(lines[2], format!("// {USER_CODE_START}"));
        assert_eq!(lines[PROLOGUE_LINES], "return (1 + 1);");
        assert_eq!(lines[PROLOGUE_LINES + 1], format!("// {USER_CODE_END}"));
        assert!(lines[0].starts_with(SETTLE_FN));
        assert_eq!(src.original(), "1 + 1");
        assert_eq!(src.executable(), "return (1 + 1);");
    }

    #[test]
    fn test_user_line_subtracts_prologue_and_floors_at_one() {
        assert_eq!(TransformedSource::user_line(4), 1);
        assert_eq!(TransformedSource::user_line(9), 6);
        assert_eq!(TransformedSource::user_line(2), 1);
        assert_eq!(TransformedSource::user_line(0), 1);
    }
}
