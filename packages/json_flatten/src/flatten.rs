//! Dotted-path flattening of JSON documents.
//!
//! The traversal is depth-first and pre-order. Object fields are visited in
//! document order (the workspace enables `serde_json/preserve_order`) and array
//! elements by index. Every array emits a `<path>.length` marker before its
//! elements; objects emit nothing for themselves.

use serde_json::{Map, Value};

const LENGTH_SUFFIX: &str = "length";

/// Ordered mapping from dotted path to scalar JSON value.
///
/// Values are kept as the original JSON scalars. Use
/// [`FlattenedJson::into_keys_values`] to get the parallel string arrays a
/// string-only host understands.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FlattenedJson {
    entries: Map<String, Value>,
}

impl FlattenedJson {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, path: &str) -> Option<&Value> {
        self.entries.get(path)
    }

    /// Iterate entries in traversal order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Split into parallel `keys` / `values` arrays, stringifying each scalar.
    pub fn into_keys_values(self) -> (Vec<String>, Vec<String>) {
        self.entries
            .into_iter()
            .map(|(key, value)| (key, scalar_to_string(&value)))
            .unzip()
    }

    fn insert(&mut self, path: String, value: Value) {
        self.entries.insert(path, value);
    }
}

/// Render a flattened scalar as a host string.
///
/// Strings are returned without quotes, numbers and booleans as their JSON
/// text, and null as the empty string. Containers never appear in a
/// flattened map; they render as their JSON text if passed anyway.
pub fn scalar_to_string(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        Value::String(s) => s.clone(),
        Value::Array(_) | Value::Object(_) => value.to_string(),
    }
}

/// Flatten a root JSON object.
///
/// Root arrays have no field name to anchor at; wrap them as `{"": [...]}`
/// first (see [`crate::wrap_root_array`]).
pub fn flatten(document: &Map<String, Value>) -> FlattenedJson {
    let mut out = FlattenedJson::new();
    for (key, value) in document {
        flatten_into(value, key.clone(), &mut out);
    }
    out
}

fn flatten_into(value: &Value, path: String, out: &mut FlattenedJson) {
    match value {
        Value::Null | Value::Bool(_) | Value::Number(_) | Value::String(_) => {
            out.insert(path, value.clone());
        }
        Value::Array(items) => {
            out.insert(
                format!("{}.{}", path, LENGTH_SUFFIX),
                Value::from(items.len()),
            );
            for (index, item) in items.iter().enumerate() {
                flatten_into(item, format!("{}.{}", path, index), out);
            }
        }
        Value::Object(fields) => {
            for (key, field) in fields {
                flatten_into(field, format!("{}.{}", path, key), out);
            }
        }
    }
}
