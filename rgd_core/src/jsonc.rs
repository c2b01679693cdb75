//! JSON-with-comments reader
//!
//! Modules are JSONC: plain JSON plus `//` line comments and `/* */` block
//! comments. Comments are removed by a string-aware scanner; newlines inside
//! removed comments are kept so `serde_json` error positions still match the
//! source file.

use crate::error::{RgdError, RgdResult};
use serde_json::Value;

/// Remove comments from JSONC text.
pub fn strip_comments(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut chars = text.chars().peekable();
    let mut in_string = false;
    let mut escaped = false;

    while let Some(c) = chars.next() {
        if in_string {
            out.push(c);
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == '"' {
                in_string = false;
            }
            continue;
        }

        match (c, chars.peek()) {
            ('"', _) => {
                in_string = true;
                out.push(c);
            }
            ('/', Some('/')) => {
                chars.next();
                for skipped in chars.by_ref() {
                    if skipped == '\n' {
                        out.push('\n');
                        break;
                    }
                }
            }
            ('/', Some('*')) => {
                chars.next();
                let mut prev = '\0';
                for skipped in chars.by_ref() {
                    if skipped == '\n' {
                        out.push('\n');
                    }
                    if prev == '*' && skipped == '/' {
                        break;
                    }
                    prev = skipped;
                }
            }
            _ => out.push(c),
        }
    }

    out
}

/// Parse JSONC text into a JSON value.
pub fn parse(source_name: &str, text: &str) -> RgdResult<Value> {
    let stripped = strip_comments(text);
    serde_json::from_str(&stripped).map_err(|e| RgdError::from_json(source_name, &e))
}

/// Canonical minified encoding of JSONC text.
pub fn minify(text: &str) -> RgdResult<String> {
    let value = parse("<inline>", text)?;
    Ok(serde_json::to_string(&value)?)
}
