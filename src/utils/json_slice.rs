//! Locating balanced JSON fragments inside free-form generative output.
//!
//! Generative backends are asked for JSON-only responses but routinely wrap
//! them in prose or code fences. These helpers find the first balanced JSON
//! object or array in a response, tracking string literals and escapes so
//! braces inside strings don't fool the scanner. Parsing the located slice
//! is the caller's job; the split keeps both halves independently testable.

use miette::Diagnostic;
use thiserror::Error;

/// Errors raised while locating or parsing a JSON fragment.
#[derive(Debug, Error, Diagnostic)]
pub enum ParseError {
    /// No balanced JSON object was found in the response.
    #[error("no balanced JSON object in response")]
    #[diagnostic(
        code(decksmith::parse::no_object),
        help("The backend may have answered in prose; the caller should fall back.")
    )]
    NoJsonObject,

    /// No balanced JSON array was found in the response.
    #[error("no balanced JSON array in response")]
    #[diagnostic(code(decksmith::parse::no_array))]
    NoJsonArray,

    /// The located fragment was not valid JSON after all.
    #[error(transparent)]
    #[diagnostic(code(decksmith::parse::serde_json))]
    Json(#[from] serde_json::Error),
}

/// Return the first balanced `{ ... }` slice of `text`, if any.
#[must_use]
pub fn extract_object(text: &str) -> Option<&str> {
    extract_balanced(text, '{', '}')
}

/// Return the first balanced `[ ... ]` slice of `text`, if any.
#[must_use]
pub fn extract_array(text: &str) -> Option<&str> {
    extract_balanced(text, '[', ']')
}

fn extract_balanced(text: &str, open: char, close: char) -> Option<&str> {
    let start = text.find(open)?;
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (offset, ch) in text[start..].char_indices() {
        if escaped {
            escaped = false;
            continue;
        }
        match ch {
            '\\' if in_string => escaped = true,
            '"' => in_string = !in_string,
            c if c == open && !in_string => depth += 1,
            c if c == close && !in_string => {
                depth -= 1;
                if depth == 0 {
                    return Some(&text[start..start + offset + ch.len_utf8()]);
                }
            }
            _ => {}
        }
    }
    None
}

// ── Tests ──────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn finds_object_inside_prose() {
        let text = "Sure! Here is the JSON:\n```json\n{\"a\": 1}\n```\nHope it helps.";
        assert_eq!(extract_object(text), Some(r#"{"a": 1}"#));
    }

    #[test]
    fn finds_nested_object() {
        let text = r#"{"outer": {"inner": [1, 2]}} trailing"#;
        assert_eq!(extract_object(text), Some(r#"{"outer": {"inner": [1, 2]}}"#));
    }

    #[test]
    fn braces_inside_strings_do_not_close() {
        let text = r#"{"text": "a } inside", "n": 1}"#;
        assert_eq!(extract_object(text), Some(text));
    }

    #[test]
    fn escaped_quotes_do_not_end_strings() {
        let text = r#"{"text": "say \"hi\" {ok}"}"#;
        assert_eq!(extract_object(text), Some(text));
    }

    #[test]
    fn finds_first_array() {
        let text = "slides below\n[{\"slideNumber\": 1}]\nend";
        assert_eq!(extract_array(text), Some(r#"[{"slideNumber": 1}]"#));
    }

    #[test]
    fn unbalanced_input_yields_none() {
        assert_eq!(extract_object("{\"a\": 1"), None);
        assert_eq!(extract_array("no json here"), None);
    }
}
