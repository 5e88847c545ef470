//! Wire envelope types for the VK API.
//!
//! # Design
//! The server wraps every answer in either `{"response": ...}` or
//! `{"error": {...}}`. Only the error side has a fixed shape, so it gets a
//! typed struct; the response payload stays a `serde_json::Value` because its
//! shape depends on the remote method.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::method::wire_value;

/// One request parameter as echoed back inside an error envelope.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RequestParam {
    pub key: String,
    pub value: String,
}

/// The body of a `{"error": {...}}` envelope.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RemoteError {
    pub error_code: i64,
    pub error_msg: String,
    #[serde(default)]
    pub request_params: Vec<RequestParam>,
}

impl RemoteError {
    /// Value of an echoed request parameter, e.g. `sig` or `timestamp`.
    pub fn param(&self, key: &str) -> Option<&str> {
        self.request_params
            .iter()
            .find(|p| p.key == key)
            .map(|p| p.value.as_str())
    }

    /// Lenient conversion for envelopes that do not match the documented
    /// shape. Missing fields fall back to code 0 and the raw JSON text.
    pub(crate) fn from_value(value: Value) -> Self {
        match serde_json::from_value::<RemoteError>(value.clone()) {
            Ok(err) => err,
            Err(_) => RemoteError {
                error_code: value.get("error_code").and_then(Value::as_i64).unwrap_or(0),
                error_msg: value
                    .get("error_msg")
                    .and_then(Value::as_str)
                    .map(str::to_string)
                    .unwrap_or_else(|| value.to_string()),
                request_params: value
                    .get("request_params")
                    .and_then(Value::as_array)
                    .map(|entries| entries.iter().filter_map(RequestParam::from_value).collect())
                    .unwrap_or_default(),
            },
        }
    }
}

impl RequestParam {
    /// Entries without a `key` are dropped; non-string values keep their
    /// argument wire form.
    fn from_value(entry: &Value) -> Option<Self> {
        let key = match entry.get("key")? {
            Value::Null => return None,
            key => wire_value(key),
        };
        let value = entry.get("value").map(wire_value).unwrap_or_default();
        Some(Self { key, value })
    }
}

impl fmt::Display for RemoteError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "VK error {}: {}", self.error_code, self.error_msg)
    }
}

impl std::error::Error for RemoteError {}

/// Classify one parsed document.
///
/// An `error` key wins over `response`; a document with neither is returned
/// as-is.
pub fn unwrap_envelope(document: Value) -> Result<Value, RemoteError> {
    match document {
        Value::Object(mut map) => {
            if let Some(error) = map.remove("error") {
                return Err(RemoteError::from_value(error));
            }
            if let Some(response) = map.remove("response") {
                return Ok(response);
            }
            Ok(Value::Object(map))
        }
        other => Ok(other),
    }
}
