//! Response-body handling: root-array wrapping and parse-then-flatten.

use std::borrow::Cow;

use serde_json::Value;

use crate::error::ParseError;
use crate::flatten::{flatten, FlattenedJson};

/// Anchor a root array under the empty field name.
///
/// If the trimmed body starts with `[` it is returned as `{"":<body>}`,
/// otherwise unchanged.
pub fn wrap_root_array(body: &str) -> Cow<'_, str> {
    if body.trim_start().starts_with('[') {
        Cow::Owned(format!("{{\"\":{}}}", body))
    } else {
        Cow::Borrowed(body)
    }
}

/// Parse a response body and flatten it.
///
/// The document root must be an object (after root-array wrapping). Scalar
/// roots and empty bodies are parse failures.
pub fn parse_body(body: &str) -> Result<FlattenedJson, ParseError> {
    let wrapped = wrap_root_array(body);
    match serde_json::from_str::<Value>(&wrapped)? {
        Value::Object(map) => Ok(flatten(&map)),
        other => Err(ParseError::NotAnObject {
            found: kind_of(&other),
        }),
    }
}

fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wraps_arrays_only() {
        assert_eq!(wrap_root_array("[1,2]"), r#"{"":[1,2]}"#);
        assert_eq!(wrap_root_array("  \n[1]"), "{\"\":  \n[1]}");
        assert!(matches!(wrap_root_array(r#"{"a":1}"#), Cow::Borrowed(_)));
        assert_eq!(wrap_root_array("42"), "42");
    }

    #[test]
    fn parses_root_array() {
        let (keys, values) = parse_body("[10,20]").unwrap().into_keys_values();
        assert_eq!(keys, vec![".length", ".0", ".1"]);
        assert_eq!(values, vec!["2", "10", "20"]);
    }

    #[test]
    fn parses_object() {
        let flat = parse_body(r#"{"ok": true, "list": ["x"]}"#).unwrap();
        assert_eq!(flat.len(), 3);
        assert_eq!(flat.get("list.0"), Some(&Value::from("x")));
    }

    #[test]
    fn rejects_invalid_json() {
        assert!(matches!(parse_body("<html>"), Err(ParseError::Json(_))));
        assert!(matches!(parse_body(""), Err(ParseError::Json(_))));
        assert!(matches!(parse_body("[1,"), Err(ParseError::Json(_))));
    }

    #[test]
    fn rejects_scalar_roots() {
        assert!(matches!(
            parse_body("42"),
            Err(ParseError::NotAnObject { found: "a number" })
        ));
        assert!(matches!(
            parse_body(r#""text""#),
            Err(ParseError::NotAnObject { found: "a string" })
        ));
    }
}
