//! Tolerant decoding of JSON payloads embedded in oracle text.
//!
//! Model output is noisy: a tag may be empty, carry prose around the JSON,
//! or contain JSON that does not parse. Every oracle-JSON access in the
//! engine goes through [`decode_json`], which reports absence and
//! malformation as values rather than errors so the state machine can treat
//! them as retry-consuming noise.

use serde::de::DeserializeOwned;

/// Outcome of decoding an embedded JSON payload.
#[derive(Debug, Clone, PartialEq)]
pub enum Decoded<T> {
    /// A payload was present and parsed.
    Value(T),
    /// The input was blank — the tag was absent or empty.
    Absent,
    /// Something was present but did not parse as the expected shape.
    Malformed(String),
}

impl<T> Decoded<T> {
    /// Return the parsed value, if any.
    pub fn value(self) -> Option<T> {
        match self {
            Decoded::Value(v) => Some(v),
            _ => None,
        }
    }

    pub fn is_absent(&self) -> bool {
        matches!(self, Decoded::Absent)
    }
}

/// Decode the first top-level JSON object embedded in `text` into `T`.
///
/// Surrounding prose is ignored; only the first balanced `{...}` region is
/// considered. Blank input is [`Decoded::Absent`]; anything that fails to
/// parse is [`Decoded::Malformed`] with the parse error message.
pub fn decode_json<T: DeserializeOwned>(text: &str) -> Decoded<T> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Decoded::Absent;
    }

    let Some(object) = first_json_object(trimmed) else {
        return Decoded::Malformed("no JSON object found".to_string());
    };

    match serde_json::from_str(object) {
        Ok(value) => Decoded::Value(value),
        Err(e) => Decoded::Malformed(e.to_string()),
    }
}

/// Find the first balanced top-level `{...}` region in `text`.
///
/// Brace counting is string-aware: braces inside JSON string literals
/// (including escaped quotes) do not affect nesting depth.
pub fn first_json_object(text: &str) -> Option<&str> {
    let bytes = text.as_bytes();
    let start = text.find('{')?;

    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (i, &b) in bytes.iter().enumerate().skip(start) {
        if in_string {
            if escaped {
                escaped = false;
            } else if b == b'\\' {
                escaped = true;
            } else if b == b'"' {
                in_string = false;
            }
            continue;
        }
        match b {
            b'"' => in_string = true,
            b'{' => depth += 1,
            b'}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(&text[start..=i]);
                }
            }
            _ => {}
        }
    }

    None
}
