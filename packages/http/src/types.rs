use std::fmt;

use serde::{Deserialize, Serialize};

use latent_http_json::parse_body;

pub const CONTENT_TYPE_JSON: &str = "application/json";

/// HTTP method for latent calls
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "UPPERCASE")]
pub enum Method {
    #[default]
    GET,
    POST,
}

impl From<Method> for http::Method {
    fn from(method: Method) -> Self {
        match method {
            Method::GET => http::Method::GET,
            Method::POST => http::Method::POST,
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Method::GET => f.write_str("GET"),
            Method::POST => f.write_str("POST"),
        }
    }
}

/// A request as handed to the transport.
///
/// Headers keep insertion order. Setting a header whose name is already
/// present (compared case-insensitively) replaces the value in place.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
pub struct HttpRequest {
    #[serde(default)]
    pub method: Method,

    /// Absolute URL
    pub url: String,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub headers: Vec<(String, String)>,

    /// Raw body text, sent as-is
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<String>,
}

impl HttpRequest {
    /// Build a request carrying the fixed default headers.
    pub fn new(method: Method, url: impl Into<String>, user_agent: &str) -> Self {
        Self {
            method,
            url: url.into(),
            ..Default::default()
        }
        .with_header("User-Agent", user_agent)
        .with_header("Content-Type", CONTENT_TYPE_JSON)
        .with_header("Accept", CONTENT_TYPE_JSON)
    }

    pub fn with_body(mut self, body: impl Into<String>) -> Self {
        self.body = Some(body.into());
        self
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.set_header(name, value);
        self
    }

    pub fn set_header(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        let value = value.into();
        match self
            .headers
            .iter_mut()
            .find(|(existing, _)| existing.eq_ignore_ascii_case(&name))
        {
            Some(entry) => entry.1 = value,
            None => self.headers.push((name, value)),
        }
    }

    /// Merge host-supplied parallel header arrays over the current headers.
    ///
    /// A key without a matching value gets the empty string.
    pub fn with_user_headers<K, V>(mut self, keys: &[K], values: &[V]) -> Self
    where
        K: AsRef<str>,
        V: AsRef<str>,
    {
        for (i, key) in keys.iter().enumerate() {
            let value = values.get(i).map(AsRef::as_ref).unwrap_or("");
            self.set_header(key.as_ref(), value);
        }
        self
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(existing, _)| existing.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }
}

/// The transport's answer, if the exchange got far enough to have one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportResponse {
    pub status: u16,
    pub body: String,
}

/// What the transport reports through the completion callback.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportReport {
    pub success: bool,
    pub response: Option<TransportResponse>,
}

impl TransportReport {
    /// The exchange completed and the body was read.
    pub fn completed(status: u16, body: impl Into<String>) -> Self {
        Self {
            success: true,
            response: Some(TransportResponse {
                status,
                body: body.into(),
            }),
        }
    }

    /// No response at all (DNS failure, refused connection, cancellation).
    pub fn no_response() -> Self {
        Self {
            success: false,
            response: None,
        }
    }
}

/// Final result of one latent call, as delivered to the caller's slots.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
pub struct RequestOutcome {
    pub success: bool,
    pub status_code: i32,
    pub raw_body: String,
    pub keys: Vec<String>,
    pub values: Vec<String>,
}

impl RequestOutcome {
    /// Turn a transport report into the caller-facing outcome.
    ///
    /// Only a successful exchange is parsed. A body that fails to parse as a
    /// JSON object downgrades `success` to false but keeps the wire status and
    /// body.
    pub fn from_report(report: TransportReport) -> Self {
        let Some(response) = report.response else {
            tracing::warn!("Response is absent, request failed before any reply");
            return Self::default();
        };

        let mut outcome = Self {
            success: report.success,
            status_code: i32::from(response.status),
            raw_body: response.body,
            ..Default::default()
        };

        if !outcome.success {
            tracing::warn!(status = outcome.status_code, "Request failed");
            return outcome;
        }

        match parse_body(&outcome.raw_body) {
            Ok(flat) => {
                let (keys, values) = flat.into_keys_values();
                tracing::debug!(entries = keys.len(), "Flattened response body");
                outcome.keys = keys;
                outcome.values = values;
            }
            Err(error) => {
                tracing::warn!(%error, "Failed to deserialize JSON response");
                outcome.success = false;
            }
        }

        outcome
    }
}
