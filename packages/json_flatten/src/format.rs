//! Request-body builders for hosts that only have parallel string arrays.
//!
//! Each value carries a [`ValueType`]. `String` values are quoted and escaped;
//! `Raw` values are assumed to already be valid JSON (numbers, booleans, or
//! pre-built object/array text) and are inserted as-is.

use std::convert::Infallible;
use std::str::FromStr;

/// How a host-supplied value is written into a JSON body.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ValueType {
    /// Quote and escape the value.
    #[default]
    String,
    /// Insert the value unchanged.
    Raw,
}

impl ValueType {
    /// Map a freeform host type tag. Only `"string"` (any case) quotes; every
    /// other tag, including unknown ones, passes the value through.
    pub fn from_tag(tag: &str) -> Self {
        if tag.eq_ignore_ascii_case("string") {
            ValueType::String
        } else {
            ValueType::Raw
        }
    }
}

impl FromStr for ValueType {
    type Err = Infallible;

    fn from_str(tag: &str) -> Result<Self, Self::Err> {
        Ok(Self::from_tag(tag))
    }
}

/// Format one value per its type.
pub fn format_value(value: &str, value_type: ValueType) -> String {
    match value_type {
        ValueType::String => quote(value),
        ValueType::Raw => value.to_string(),
    }
}

/// Format one value per a freeform type tag.
pub fn format_scalar(value: &str, tag: &str) -> String {
    format_value(value, ValueType::from_tag(tag))
}

fn quote(value: &str) -> String {
    let mut out = String::with_capacity(value.len() + 2);
    out.push('"');
    for c in value.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\t' => out.push_str("\\t"),
            '\u{8}' => out.push_str("\\b"),
            '\u{c}' => out.push_str("\\f"),
            '\r' => out.push_str("\\r"),
            '"' => out.push_str("\\\""),
            other => out.push(other),
        }
    }
    out.push('"');
    out
}

fn value_at<S: AsRef<str>>(values: &[S], index: usize) -> &str {
    values.get(index).map(AsRef::as_ref).unwrap_or("")
}

fn type_at(types: &[ValueType], index: usize) -> ValueType {
    types.get(index).copied().unwrap_or_default()
}

/// Build `{"k1":v1,"k2":v2,...}`.
///
/// Keys are always quoted. A missing value is `""`; a missing type is
/// [`ValueType::String`].
pub fn make_object<K, V>(keys: &[K], values: &[V], types: &[ValueType]) -> String
where
    K: AsRef<str>,
    V: AsRef<str>,
{
    let fields: Vec<String> = keys
        .iter()
        .enumerate()
        .map(|(i, key)| {
            format!(
                "{}:{}",
                quote(key.as_ref()),
                format_value(value_at(values, i), type_at(types, i))
            )
        })
        .collect();
    format!("{{{}}}", fields.join(","))
}

/// Build `[v1,v2,...]` with the same per-element rule as [`make_object`].
pub fn make_array<V: AsRef<str>>(values: &[V], types: &[ValueType]) -> String {
    let items: Vec<String> = values
        .iter()
        .enumerate()
        .map(|(i, value)| format_value(value.as_ref(), type_at(types, i)))
        .collect();
    format!("[{}]", items.join(","))
}

/// [`make_object`] with every value quoted.
pub fn make_simple_object<K, V>(keys: &[K], values: &[V]) -> String
where
    K: AsRef<str>,
    V: AsRef<str>,
{
    make_object(keys, values, &[])
}
