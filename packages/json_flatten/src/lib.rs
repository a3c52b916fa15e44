//! # latent-http-json
//!
//! Converts JSON documents into the flat key/value form that string-only
//! scripting hosts can consume, and builds JSON request bodies from the
//! parallel arrays those hosts produce.
//!
//! ## Flattening
//!
//! Nested objects and arrays become dotted paths. Arrays also record their
//! length under `<path>.length`:
//!
//! ```
//! use latent_http_json::parse_body;
//!
//! let flat = parse_body(r#"{"a":{"b":1,"c":[2,3]}}"#).unwrap();
//! let (keys, values) = flat.into_keys_values();
//!
//! assert_eq!(keys, ["a.b", "a.c.length", "a.c.0", "a.c.1"]);
//! assert_eq!(values, ["1", "2", "2", "3"]);
//! ```
//!
//! A body whose root is an array is anchored under the empty field name, so
//! `[10,20]` flattens to `.length`, `.0` and `.1`.
//!
//! ## Building bodies
//!
//! ```
//! use latent_http_json::{make_object, make_simple_object, ValueType};
//!
//! assert_eq!(make_simple_object(&["x", "y"], &["1", "2"]), r#"{"x":"1","y":"2"}"#);
//! assert_eq!(
//!     make_object(&["n", "s"], &["42", "hi"], &[ValueType::Raw]),
//!     r#"{"n":42,"s":"hi"}"#
//! );
//! ```

pub mod body;
pub mod error;
pub mod flatten;
pub mod format;

pub use body::{parse_body, wrap_root_array};
pub use error::ParseError;
pub use flatten::{flatten, scalar_to_string, FlattenedJson};
pub use format::{
    format_scalar, format_value, make_array, make_object, make_simple_object, ValueType,
};
