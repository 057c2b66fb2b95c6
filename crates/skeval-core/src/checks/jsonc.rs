//! JSON-with-comments parsing and best-effort extraction from free text.
//!
//! Extraction is lossy and order-dependent: a fenced code block wins over a
//! loose `{...}` span, which wins over a loose `[...]` span. Spans are
//! greedy (first opener to last closer), so prose containing stray braces
//! can defeat the scan.

use std::sync::LazyLock;

use regex::Regex;
use serde_json::Value;

static CODE_BLOCK: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)```(?:jsonc|json)?\s*(.*?)```").expect("static code block regex")
});

static NAMED_OBJECT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"(?s)\{.*"name".*\}"#).expect("static named object regex"));

static ENTITY_OBJECT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?s)\{.*"name".*"properties".*\}"#).expect("static entity object regex")
});

/// Remove `//` line comments and `/* */` block comments.
///
/// Comment markers inside string literals are kept, and line breaks inside
/// removed comments survive so parse errors keep their line numbers.
pub fn strip_comments(src: &str) -> String {
    let mut out = String::with_capacity(src.len());
    let mut chars = src.chars().peekable();
    let mut in_string = false;

    while let Some(c) = chars.next() {
        if in_string {
            out.push(c);
            match c {
                '\\' => {
                    if let Some(escaped) = chars.next() {
                        out.push(escaped);
                    }
                }
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }

        match c {
            '"' => {
                in_string = true;
                out.push(c);
            }
            '/' if chars.peek() == Some(&'/') => {
                for n in chars.by_ref() {
                    if n == '\n' {
                        out.push('\n');
                        break;
                    }
                }
            }
            '/' if chars.peek() == Some(&'*') => {
                chars.next();
                let mut prev = '\0';
                for n in chars.by_ref() {
                    if prev == '*' && n == '/' {
                        break;
                    }
                    if n == '\n' {
                        out.push('\n');
                    }
                    prev = n;
                }
            }
            _ => out.push(c),
        }
    }
    out
}

/// Parse JSONC text into a value.
pub fn parse_jsonc(src: &str) -> serde_json::Result<Value> {
    serde_json::from_str(strip_comments(src).trim())
}

/// Body of the first fenced code block (optionally tagged `json`/`jsonc`).
pub fn code_block(output: &str) -> Option<&str> {
    CODE_BLOCK
        .captures(output)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str())
}

/// Greedy span from the first `open` to the last `close`.
fn span(output: &str, open: char, close: char) -> Option<&str> {
    let start = output.find(open)?;
    let end = output.rfind(close)?;
    (end > start).then(|| &output[start..=end])
}

/// Extract any JSON value: code block, then object span, then array span.
pub fn extract_json(output: &str) -> Option<Value> {
    code_block(output)
        .and_then(|body| parse_jsonc(body).ok())
        .or_else(|| span(output, '{', '}').and_then(|s| parse_jsonc(s).ok()))
        .or_else(|| span(output, '[', ']').and_then(|s| parse_jsonc(s).ok()))
}

/// Extract a definition object: code block, then an object span that
/// mentions `"name"` (and `"properties"` when `with_properties`).
pub fn extract_definition(output: &str, with_properties: bool) -> Option<Value> {
    if let Some(value) = code_block(output).and_then(|body| parse_jsonc(body).ok()) {
        return Some(value);
    }
    let re = if with_properties {
        &*ENTITY_OBJECT
    } else {
        &*NAMED_OBJECT
    };
    re.find(output).and_then(|m| parse_jsonc(m.as_str()).ok())
}
