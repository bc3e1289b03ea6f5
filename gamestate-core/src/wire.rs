//! Boundary serialization for payloads leaving the service.
//!
//! JavaScript clients parse JSON numbers as IEEE-754 doubles, so any integer
//! outside ±(2^53 − 1) is emitted as a decimal string instead of being
//! silently rounded. Every payload goes through [`to_wire`], usually via
//! [`Envelope`].

use serde::Serialize;
use serde_json::{Map, Number, Value};

use crate::error::{ErrorKind, GameStateError};

/// Largest integer a double represents exactly (2^53 − 1).
pub const MAX_SAFE_INTEGER: u64 = 9_007_199_254_740_991;

fn is_safe(n: &Number) -> bool {
    if let Some(u) = n.as_u64() {
        u <= MAX_SAFE_INTEGER
    } else if let Some(i) = n.as_i64() {
        i.unsigned_abs() <= MAX_SAFE_INTEGER
    } else {
        true
    }
}

/// Rewrite unsafe integers in `value` as strings, recursively.
#[must_use]
pub fn widen_unsafe_integers(value: Value) -> Value {
    match value {
        Value::Number(n) if !is_safe(&n) => Value::String(n.to_string()),
        Value::Array(items) => Value::Array(items.into_iter().map(widen_unsafe_integers).collect()),
        Value::Object(fields) => Value::Object(
            fields
                .into_iter()
                .map(|(k, v)| (k, widen_unsafe_integers(v)))
                .collect::<Map<String, Value>>(),
        ),
        other => other,
    }
}

/// Serialize `payload` to JSON with unsafe integers widened to strings.
///
/// # Errors
/// Returns the `serde_json` error if `payload` cannot be serialized.
pub fn to_wire<T: Serialize + ?Sized>(payload: &T) -> serde_json::Result<Value> {
    serde_json::to_value(payload).map(widen_unsafe_integers)
}

/// The response body handed to the request-handling layer.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Envelope {
    /// Whether the operation succeeded.
    pub success: bool,
    /// Payload on success.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    /// Failure category on error.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorKind>,
    /// Human-readable message.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl Envelope {
    /// Wrap a successful payload.
    ///
    /// # Errors
    /// Returns the `serde_json` error if `payload` cannot be serialized.
    pub fn ok<T: Serialize + ?Sized>(payload: &T) -> serde_json::Result<Self> {
        Ok(Self {
            success: true,
            data: Some(to_wire(payload)?),
            error: None,
            message: None,
        })
    }

    /// A success with only a message, e.g. after `leave`.
    #[must_use]
    pub fn message(message: impl Into<String>) -> Self {
        Self {
            success: true,
            data: None,
            error: None,
            message: Some(message.into()),
        }
    }

    /// Wrap a failure.
    #[must_use]
    pub fn failure(err: &GameStateError) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(err.kind()),
            message: Some(err.to_string()),
        }
    }

    /// Build an envelope from an operation result.
    #[must_use]
    pub fn from_result<T: Serialize>(result: &Result<T, GameStateError>) -> Self {
        match result {
            Ok(payload) => Self::ok(payload).unwrap_or_else(|e| Self {
                success: false,
                data: None,
                error: None,
                message: Some(format!("response serialization failed: {e}")),
            }),
            Err(err) => Self::failure(err),
        }
    }
}
