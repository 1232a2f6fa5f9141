use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::ProtocolError;

/// Message used when a failed reply carries no text.
const UNKNOWN_ERROR: &str = "unknown server error";

/// Decoded `{success, ...}` reply of an admin action endpoint.
///
/// Successful replies deserialize the whole object into `T`, so `T`
/// only names the fields it needs (`access_groups`, `id`, ...).
#[derive(Debug, Clone, PartialEq)]
pub enum ApiReply<T> {
    Ok(T),
    Err { message: String },
}

impl<T: DeserializeOwned> ApiReply<T> {
    /// Decodes a response body.
    pub fn from_slice(body: &[u8]) -> Result<Self, ProtocolError> {
        let value: Value = serde_json::from_slice(body)?;
        Self::from_value(value)
    }

    /// Decodes an already parsed JSON value.
    pub fn from_value(value: Value) -> Result<Self, ProtocolError> {
        if !value.is_object() {
            return Err(ProtocolError::Malformed(format!(
                "expected JSON object, got {value}"
            )));
        }
        if is_success(value.get("success")) {
            Ok(ApiReply::Ok(serde_json::from_value(value)?))
        } else {
            Ok(ApiReply::Err {
                message: message_of(&value).unwrap_or_else(|| UNKNOWN_ERROR.into()),
            })
        }
    }

    /// Converts into a `Result`, mapping the failure text to `ProtocolError::Rejected`.
    pub fn into_result(self) -> Result<T, ProtocolError> {
        match self {
            ApiReply::Ok(payload) => Ok(payload),
            ApiReply::Err { message } => Err(ProtocolError::Rejected(message)),
        }
    }
}

fn is_success(value: Option<&Value>) -> bool {
    match value {
        Some(Value::Bool(b)) => *b,
        Some(Value::Number(n)) => n.as_i64() == Some(1),
        Some(Value::String(s)) => matches!(s.as_str(), "true" | "1" | "t"),
        _ => false,
    }
}

fn message_of(value: &Value) -> Option<String> {
    match value.get("message")? {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Null => None,
        Value::String(_) => None,
        other => Some(other.to_string()),
    }
}

/// Extracts the `message` of an error body, if the body is JSON and has one.
///
/// Used for non-200 responses, whose bodies are informational only.
pub fn error_message(body: &[u8]) -> Option<String> {
    let value: Value = serde_json::from_slice(body).ok()?;
    message_of(&value)
}
