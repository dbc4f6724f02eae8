//! Uniform success/failure envelope returned by every client call.

use bytes::Bytes;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::transport::{HttpResponse, TransportError};

/// Outcome of one logical call (after any retries).
///
/// `status` is 0 when no HTTP response was received. `data` holds the parsed
/// JSON body (or `Null`), `body` the raw bytes for binary downloads.
#[derive(Clone, Debug)]
pub struct NormalizedResponse {
    pub success: bool,
    pub status: u16,
    pub data: Value,
    pub body: Bytes,
    pub message: String,
}

impl NormalizedResponse {
    pub(crate) fn from_response(response: HttpResponse) -> Self {
        let data = if response.body.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&response.body).unwrap_or(Value::Null)
        };

        if response.is_success() {
            return Self {
                success: true,
                status: response.status,
                data,
                body: response.body,
                message: String::new(),
            };
        }

        let message = extract_message(&data).unwrap_or_else(|| {
            format!("Request failed with status code {}", response.status)
        });

        Self {
            success: false,
            status: response.status,
            data,
            body: response.body,
            message,
        }
    }

    pub(crate) fn from_transport_error(error: &TransportError) -> Self {
        let message = error.to_string();
        Self {
            success: false,
            status: 0,
            data: Value::Null,
            body: Bytes::new(),
            message: if message.is_empty() {
                "Request failed".to_string()
            } else {
                message
            },
        }
    }

    /// True when the failure happened before any HTTP response arrived.
    pub fn is_transport_failure(&self) -> bool {
        !self.success && self.status == 0
    }

    /// Deserialize `data` into a typed payload.
    pub fn json<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        serde_json::from_value(self.data.clone())
    }
}

/// Best-effort human message from an error payload.
///
/// Order: `detail`, then `message`, then the first field-level validation
/// message (`field: a, b`), then a bare list of strings.
pub fn extract_message(data: &Value) -> Option<String> {
    match data {
        Value::Object(map) => {
            for key in ["detail", "message"] {
                if let Some(Value::String(s)) = map.get(key) {
                    if !s.trim().is_empty() {
                        return Some(s.clone());
                    }
                }
            }
            let (field, value) = map.iter().next()?;
            match value {
                Value::Array(items) if !items.is_empty() => {
                    let parts: Vec<String> = items.iter().map(value_to_text).collect();
                    Some(format!("{}: {}", field, parts.join(", ")))
                }
                Value::String(s) if !s.is_empty() => Some(format!("{}: {}", field, s)),
                _ => None,
            }
        }
        Value::Array(items) if !items.is_empty() => Some(
            items
                .iter()
                .map(value_to_text)
                .collect::<Vec<_>>()
                .join(", "),
        ),
        _ => None,
    }
}

fn value_to_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
