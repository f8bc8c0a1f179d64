//! Typed interpretation of raw strings.
//!
//! Environment variable values and override arguments arrive as plain
//! strings; [`parse_value`] applies a fixed grammar, first match wins:
//! booleans, null, integers, floats, JSON compounds, quoted strings, and
//! finally the raw string itself.

use regex_lite::Regex;
use serde_json::Value;
use std::sync::LazyLock;

static INT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^-?[0-9]+$").expect("integer pattern compiles"));

static FLOAT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^-?[0-9]+\.[0-9]+([eE][+-]?[0-9]+)?$").expect("float pattern compiles")
});

/// Parse one raw string into a typed value.
pub fn parse_value(raw: &str) -> Value {
    if raw.is_empty() {
        return Value::String(String::new());
    }

    match raw.to_ascii_lowercase().as_str() {
        "true" => return Value::Bool(true),
        "false" => return Value::Bool(false),
        "null" => return Value::Null,
        _ => {}
    }

    if INT_RE.is_match(raw) {
        if let Ok(n) = raw.parse::<i64>() {
            return Value::Number(n.into());
        }
        // Overflow: no later rule can match an integer literal, so it stays
        // a raw string.
        return Value::String(raw.to_string());
    }

    if FLOAT_RE.is_match(raw)
        && let Ok(f) = raw.parse::<f64>()
        && let Some(n) = serde_json::Number::from_f64(f)
    {
        return Value::Number(n);
    }

    let bytes = raw.as_bytes();
    let (first, last) = (bytes[0], bytes[bytes.len() - 1]);

    if (first == b'{' && last == b'}') || (first == b'[' && last == b']') {
        if let Ok(value) = serde_json::from_str::<Value>(raw) {
            return value;
        }
    }

    if first == b'"' && last == b'"' && raw.len() >= 2 {
        if let Ok(value @ Value::String(_)) = serde_json::from_str::<Value>(raw) {
            return value;
        }
    }

    Value::String(raw.to_string())
}

/// Parse a string as JSON, falling back to a raw string value.
///
/// Used by the CLI's `set` command and override values, where JSON syntax is
/// expected but bare words are tolerated.
pub fn parse_json_or_string(raw: &str) -> Value {
    serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()))
}
