use std::sync::LazyLock;

use chrono::DateTime;
use regex::Regex;
use serde_json::Value;

use crate::mutate::error::ActionError;

static TRUE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^(true|t|yes|y|1)$").expect("valid true regex"));
static FALSE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^(false|f|no|n|0)$").expect("valid false regex"));

/// The closed set of target types the `convert` action accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConvertType {
    String,
    Integer,
    Float,
    Boolean,
    Datetime,
}

impl ConvertType {
    /// Parses a configured type name; `None` for anything outside the
    /// closed set.
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "string" => Some(Self::String),
            "integer" => Some(Self::Integer),
            "float" => Some(Self::Float),
            "boolean" => Some(Self::Boolean),
            "datetime" => Some(Self::Datetime),
            _ => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::String => "string",
            Self::Integer => "integer",
            Self::Float => "float",
            Self::Boolean => "boolean",
            Self::Datetime => "datetime",
        }
    }
}

/// Converts one scalar value.
///
/// `Ok(None)` is a recoverable per-value failure that has already been
/// logged; the caller keeps the original value. `Err` aborts the whole
/// action at the pipeline boundary.
pub fn convert_scalar(value: &Value, target: ConvertType) -> Result<Option<Value>, ActionError> {
    match target {
        ConvertType::String => Ok(Some(Value::String(render_string(value)))),
        ConvertType::Integer => to_integer(value).map(|n| Some(Value::from(n))),
        ConvertType::Float => to_float(value).map(|f| Some(Value::from(f))),
        ConvertType::Boolean => Ok(to_boolean(value)),
        ConvertType::Datetime => to_datetime(value).map(Some),
    }
}

/// Renders a value as display text: strings pass through, numbers and
/// booleans use their JSON text, null is empty, containers render as
/// compact JSON.
pub fn render_string(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        Value::String(text) => text.clone(),
        container => serde_json::to_string(container).unwrap_or_default(),
    }
}

/// Short type tag used in log and error messages.
pub(crate) fn value_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

fn to_integer(value: &Value) -> Result<i64, ActionError> {
    match value {
        Value::Array(_) | Value::Object(_) => Err(ActionError::Unconvertible {
            target: "integer",
            found: value_kind(value),
        }),
        Value::Number(n) => Ok(n
            .as_i64()
            .unwrap_or_else(|| n.as_f64().unwrap_or(0.0) as i64)),
        other => Ok(parse_integer_prefix(&render_string(other))),
    }
}

fn to_float(value: &Value) -> Result<f64, ActionError> {
    match value {
        Value::Array(_) | Value::Object(_) => Err(ActionError::Unconvertible {
            target: "float",
            found: value_kind(value),
        }),
        Value::Number(n) => Ok(n.as_f64().unwrap_or(0.0)),
        other => Ok(parse_float_prefix(&render_string(other))),
    }
}

/// Recoverable by design: anything that is not a recognized truthy or
/// falsy token logs an error and yields `None` so the field keeps its
/// original value.
fn to_boolean(value: &Value) -> Option<Value> {
    if let Value::String(text) = value {
        if TRUE_RE.is_match(text) {
            return Some(Value::Bool(true));
        }
        if text.is_empty() || FALSE_RE.is_match(text) {
            return Some(Value::Bool(false));
        }
    }
    log::error!(
        "failed to convert to boolean: value={}",
        render_string(value)
    );
    None
}

/// Treats the value as epoch seconds (parsing a numeric string prefix
/// first) and renders an RFC 3339 timestamp in UTC.
fn to_datetime(value: &Value) -> Result<Value, ActionError> {
    let seconds = match value {
        Value::String(text) => parse_integer_prefix(text),
        Value::Number(n) => n
            .as_i64()
            .unwrap_or_else(|| n.as_f64().unwrap_or(0.0) as i64),
        other => {
            return Err(ActionError::Unconvertible {
                target: "datetime",
                found: value_kind(other),
            });
        }
    };
    let rendered = DateTime::from_timestamp(seconds, 0)
        .ok_or(ActionError::TimestampOutOfRange(seconds))?;
    Ok(Value::String(rendered.to_rfc3339()))
}

/// Numeric prefix parse with permissive-zero semantics: leading
/// whitespace, an optional sign, then digits with `_` separators. The
/// parse stops at the first character that cannot extend it; no digits
/// at all yields 0.
fn parse_integer_prefix(text: &str) -> i64 {
    let trimmed = text.trim_start();
    let (negative, rest) = match trimmed.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, trimmed.strip_prefix('+').unwrap_or(trimmed)),
    };

    let bytes = rest.as_bytes();
    let mut digits = String::new();
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i].is_ascii_digit() {
            digits.push(bytes[i] as char);
        } else if !(bytes[i] == b'_'
            && !digits.is_empty()
            && bytes.get(i + 1).is_some_and(u8::is_ascii_digit))
        {
            break;
        }
        i += 1;
    }

    if digits.is_empty() {
        return 0;
    }
    let magnitude = digits.parse::<i64>().unwrap_or(i64::MAX);
    if negative { -magnitude } else { magnitude }
}

/// Like `parse_integer_prefix` but accepts a fractional part and an
/// exponent; the longest prefix that forms a number wins.
fn parse_float_prefix(text: &str) -> f64 {
    let trimmed = text.trim_start();
    let bytes = trimmed.as_bytes();

    // `end` only advances on digits, so an incomplete suffix such as a
    // bare exponent marker or trailing dot is never included.
    let mut end = 0;
    let mut seen_digit = false;
    let mut seen_dot = false;
    let mut in_exponent = false;
    let mut exponent_start = 0;
    let mut i = 0;

    while i < bytes.len() {
        let accepted = match bytes[i] {
            b'0'..=b'9' => {
                seen_digit = true;
                end = i + 1;
                true
            }
            b'+' | b'-' => i == 0 || (in_exponent && i == exponent_start),
            b'_' => {
                i > 0
                    && bytes[i - 1].is_ascii_digit()
                    && bytes.get(i + 1).is_some_and(u8::is_ascii_digit)
            }
            b'.' if !seen_dot && !in_exponent => {
                seen_dot = bytes.get(i + 1).is_some_and(u8::is_ascii_digit);
                seen_dot
            }
            b'e' | b'E' if seen_digit && !in_exponent => {
                in_exponent = true;
                exponent_start = i + 1;
                true
            }
            _ => false,
        };
        if !accepted {
            break;
        }
        i += 1;
    }

    if end == 0 {
        return 0.0;
    }
    let prefix: String = trimmed[..end].chars().filter(|&c| c != '_').collect();
    prefix.parse::<f64>().unwrap_or(0.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn converted(value: Value, target: ConvertType) -> Value {
        convert_scalar(&value, target)
            .expect("conversion should not abort")
            .expect("conversion should produce a value")
    }

    #[test]
    fn test_integer_prefix_parse() {
        assert_eq!(parse_integer_prefix("42"), 42);
        assert_eq!(parse_integer_prefix("  -17 apples"), -17);
        assert_eq!(parse_integer_prefix("+8"), 8);
        assert_eq!(parse_integer_prefix("1_000_000"), 1_000_000);
        assert_eq!(parse_integer_prefix("12.9"), 12);
        assert_eq!(parse_integer_prefix("abc"), 0);
        assert_eq!(parse_integer_prefix(""), 0);
        assert_eq!(parse_integer_prefix("_5"), 0);
        assert_eq!(parse_integer_prefix("5_"), 5);
    }

    #[test]
    fn test_float_prefix_parse() {
        assert_eq!(parse_float_prefix("3.5"), 3.5);
        assert_eq!(parse_float_prefix("-2.25e2 rest"), -225.0);
        assert_eq!(parse_float_prefix("1e3"), 1000.0);
        assert_eq!(parse_float_prefix("1e"), 1.0);
        assert_eq!(parse_float_prefix("1e+2"), 100.0);
        assert_eq!(parse_float_prefix(".5"), 0.5);
        assert_eq!(parse_float_prefix("5."), 5.0);
        assert_eq!(parse_float_prefix("12.34.56"), 12.34);
        assert_eq!(parse_float_prefix("1_000.5"), 1000.5);
        assert_eq!(parse_float_prefix("none"), 0.0);
    }

    #[test]
    fn test_convert_to_string() {
        assert_eq!(converted(json!(100), ConvertType::String), json!("100"));
        assert_eq!(converted(json!(4.0), ConvertType::String), json!("4.0"));
        assert_eq!(converted(json!(true), ConvertType::String), json!("true"));
    }

    #[test]
    fn test_convert_to_integer() {
        assert_eq!(converted(json!("100"), ConvertType::Integer), json!(100));
        assert_eq!(converted(json!(3.7), ConvertType::Integer), json!(3));
        assert_eq!(converted(json!(-3.7), ConvertType::Integer), json!(-3));
        assert_eq!(converted(json!("junk"), ConvertType::Integer), json!(0));
    }

    #[test]
    fn test_convert_string_integer_round_trip() {
        let n = json!(-90210);
        let text = converted(n.clone(), ConvertType::String);
        assert_eq!(converted(text, ConvertType::Integer), n);
    }

    #[test]
    fn test_convert_to_float() {
        assert_eq!(converted(json!("2.5"), ConvertType::Float), json!(2.5));
        assert_eq!(converted(json!(7), ConvertType::Float), json!(7.0));
    }

    #[test]
    fn test_convert_to_boolean_tokens() {
        for token in ["true", "T", "yes", "Y", "1"] {
            assert_eq!(
                converted(json!(token), ConvertType::Boolean),
                json!(true),
                "token {token:?}"
            );
        }
        for token in ["false", "F", "no", "N", "0", ""] {
            assert_eq!(
                converted(json!(token), ConvertType::Boolean),
                json!(false),
                "token {token:?}"
            );
        }
    }

    #[test]
    fn test_convert_to_boolean_failure_is_recoverable() {
        let outcome = convert_scalar(&json!("maybe"), ConvertType::Boolean);
        assert!(matches!(outcome, Ok(None)));
        let outcome = convert_scalar(&json!(12), ConvertType::Boolean);
        assert!(matches!(outcome, Ok(None)));
    }

    #[test]
    fn test_convert_to_datetime() {
        assert_eq!(
            converted(json!(0), ConvertType::Datetime),
            json!("1970-01-01T00:00:00+00:00")
        );
        assert_eq!(
            converted(json!("1234567890"), ConvertType::Datetime),
            json!("2009-02-13T23:31:30+00:00")
        );
    }

    #[test]
    fn test_convert_datetime_rejects_non_timestamps() {
        assert!(convert_scalar(&json!(true), ConvertType::Datetime).is_err());
        assert!(convert_scalar(&json!(null), ConvertType::Datetime).is_err());
    }

    #[test]
    fn test_convert_rejects_containers() {
        assert!(convert_scalar(&json!([1, 2]), ConvertType::Integer).is_err());
        assert!(convert_scalar(&json!({"a": 1}), ConvertType::Float).is_err());
    }

    #[test]
    fn test_render_string_containers_as_json() {
        assert_eq!(render_string(&json!({"a": 1})), r#"{"a":1}"#);
        assert_eq!(render_string(&json!(null)), "");
    }

    #[test]
    fn test_convert_type_names() {
        assert_eq!(ConvertType::from_name("datetime"), Some(ConvertType::Datetime));
        assert_eq!(ConvertType::from_name("date"), None);
        assert_eq!(ConvertType::Integer.name(), "integer");
    }
}
