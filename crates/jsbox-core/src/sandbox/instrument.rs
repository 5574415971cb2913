//! Statement marks for locating runtime faults.
//!
//! The engine keeps no source positions at run time, so before evaluation the
//! worker rewrites the user block of the script: each top-level statement
//! gets a leading `__jsbox_mark(line, column);` call. When an error escapes,
//! the prelude turns the last mark into an `<anonymous>:L:C` frame.
//!
//! A line is marked only when it starts a statement for certain: the previous
//! code line ends with `;` or `}`, the line does not open with a continuation
//! token, and the block up to it parses as a complete function body. If the
//! rewritten script does not parse, the original is returned unchanged.

use boa_engine::{Context, Script, Source};

use super::prelude::MARK_FN;
use crate::transform::{USER_CODE_END, USER_CODE_START};

const CONTINUATION_PREFIXES: &[char] = &[
    '.', ',', ')', ']', '}', '?', ':', '+', '-', '*', '/', '%', '=', '&', '|', '^', '(', '[',
    '`', '<', '>',
];

const CONTINUATION_WORDS: &[&str] = &["else", "catch", "finally", "in", "instanceof"];

fn continues_previous(trimmed: &str) -> bool {
    if trimmed.starts_with(CONTINUATION_PREFIXES) {
        return true;
    }
    CONTINUATION_WORDS.iter().any(|word| {
        trimmed.strip_prefix(word).is_some_and(|rest| {
            !rest.starts_with(|c: char| c.is_ascii_alphanumeric() || c == '_' || c == '$')
        })
    })
}

fn parses(source: &str, context: &mut Context) -> bool {
    Script::parse(Source::from_bytes(source), None, context).is_ok()
}

fn body_parses(lines: &[&str], context: &mut Context) -> bool {
    let body = lines.join("\n");
    parses(
        &format!("(async function () {{\n\"use strict\";\n{body}\n}});"),
        context,
    )
}

/// Insert statement marks into the user block of `script`.
pub fn instrument(script: &str, context: &mut Context) -> String {
    let lines: Vec<&str> = script.split('\n').collect();
    let Some(start) = lines.iter().position(|l| l.contains(USER_CODE_START)) else {
        return script.to_string();
    };
    let Some(end) = lines.iter().rposition(|l| l.contains(USER_CODE_END)) else {
        return script.to_string();
    };
    if end <= start {
        return script.to_string();
    }

    let first = start + 1;
    let body = &lines[first..end];
    let mut marked: Vec<String> = lines.iter().map(|l| l.to_string()).collect();
    let mut previous: Option<&str> = None;
    let mut count = 0usize;

    for (k, line) in body.iter().enumerate() {
        let trimmed = line.trim_start();
        if trimmed.is_empty() || trimmed.starts_with("//") {
            continue;
        }
        let boundary = previous.map_or(true, |p| p.ends_with(';') || p.ends_with('}'));
        previous = Some(line.trim_end());
        if !boundary || continues_previous(trimmed) || !body_parses(&body[..k], context) {
            continue;
        }
        let indent = &line[..line.len() - trimmed.len()];
        let raw_line = first + k + 1;
        let column = indent.chars().count() + 1;
        marked[first + k] = format!("{indent}{MARK_FN}({raw_line}, {column}); {trimmed}");
        count += 1;
    }

    if count == 0 {
        return script.to_string();
    }
    let rewritten = marked.join("\n");
    if parses(&rewritten, context) {
        rewritten
    } else {
        tracing::debug!("statement marks rejected by the parser, running unmarked");
        script.to_string()
    }
}
