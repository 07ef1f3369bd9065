//! Normalized command envelope.
//!
//! Every backend reply is coerced into a [`CommandEnvelope`] through the
//! [`RawReply`] tagged union, so the shape callers see never depends on which
//! transport produced it.
//!
//! # Format
//!
//! ```json
//! { "success": true, "data": { ... } }
//! { "success": false, "error": "insufficient balance" }
//! ```

// ============================================================================
// Imports
// ============================================================================

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::Error;

// ============================================================================
// CommandEnvelope
// ============================================================================

/// Normalized reply to a command.
///
/// When `success` is `false`, `error` is always present (possibly empty).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommandEnvelope<T = Value> {
    /// Whether the command succeeded.
    pub success: bool,

    /// Payload on success.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,

    /// Error message on failure.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    /// Optional human-readable message from the backend.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,

    /// Correlation id, when the reply came over the stream.
    #[serde(
        default,
        rename = "requestId",
        alias = "request_id",
        skip_serializing_if = "Option::is_none"
    )]
    pub request_id: Option<String>,
}

impl<T> CommandEnvelope<T> {
    /// Creates a success envelope.
    #[inline]
    #[must_use]
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
            message: None,
            request_id: None,
        }
    }

    /// Creates a failure envelope.
    #[inline]
    #[must_use]
    pub fn failure(error: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(error.into()),
            message: None,
            request_id: None,
        }
    }

    /// Attaches a correlation id.
    #[inline]
    #[must_use]
    pub fn with_request_id(mut self, request_id: impl Into<String>) -> Self {
        self.request_id = Some(request_id.into());
        self
    }

    /// Returns the error text of a failed envelope.
    #[inline]
    #[must_use]
    pub fn error_message(&self) -> Option<&str> {
        if self.success {
            None
        } else {
            Some(self.error.as_deref().unwrap_or_default())
        }
    }

    /// Maps the payload, keeping status and metadata.
    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> CommandEnvelope<U> {
        CommandEnvelope {
            success: self.success,
            data: self.data.map(f),
            error: self.error,
            message: self.message,
            request_id: self.request_id,
        }
    }

    /// Converts into a `Result`, using the error text on failure.
    ///
    /// A successful envelope without data yields `Ok(None)`.
    ///
    /// # Errors
    ///
    /// Returns the envelope's `error` string if `success` is `false`.
    pub fn into_result(self) -> std::result::Result<Option<T>, String> {
        if self.success {
            Ok(self.data)
        } else {
            Err(self.error.unwrap_or_default())
        }
    }
}

impl CommandEnvelope<Value> {
    /// Deserializes the payload into `T`.
    ///
    /// A payload that does not match `T` turns the envelope into a failure.
    #[must_use]
    pub fn into_typed<T: DeserializeOwned>(self) -> CommandEnvelope<T> {
        let CommandEnvelope {
            success,
            data,
            error,
            message,
            request_id,
        } = self;

        let data = match data.map(serde_json::from_value::<T>).transpose() {
            Ok(data) => data,
            Err(e) => {
                return CommandEnvelope {
                    success: false,
                    data: None,
                    error: Some(Error::from(e).to_string()),
                    message,
                    request_id,
                };
            }
        };

        CommandEnvelope {
            success,
            data,
            error,
            message,
            request_id,
        }
    }
}

impl<T> From<Error> for CommandEnvelope<T> {
    fn from(err: Error) -> Self {
        Self::failure(err.to_string())
    }
}

// ============================================================================
// RawReply
// ============================================================================

/// A backend reply before normalization.
#[derive(Debug, Clone, PartialEq)]
pub enum RawReply {
    /// Already shaped as an envelope (carries a boolean `success`).
    Envelope(CommandEnvelope),
    /// Arbitrary value returned by the local bridge.
    LocalResult(Value),
    /// Arbitrary JSON body returned by a 2xx HTTP response.
    HttpBody(Value),
}

impl RawReply {
    /// Classifies a local bridge result.
    #[must_use]
    pub fn from_local(value: Value) -> Self {
        match as_envelope(&value) {
            Some(envelope) => Self::Envelope(envelope),
            None => Self::LocalResult(value),
        }
    }

    /// Classifies an HTTP or stream body.
    #[must_use]
    pub fn from_http(value: Value) -> Self {
        match as_envelope(&value) {
            Some(envelope) => Self::Envelope(envelope),
            None => Self::HttpBody(value),
        }
    }

    /// Produces the canonical envelope.
    #[must_use]
    pub fn normalize(self) -> CommandEnvelope {
        match self {
            Self::Envelope(mut envelope) => {
                if !envelope.success && envelope.error.is_none() {
                    envelope.error = Some(envelope.message.clone().unwrap_or_default());
                }
                envelope
            }
            Self::LocalResult(value) | Self::HttpBody(value) => CommandEnvelope::success(value),
        }
    }
}

/// Reads `value` as an envelope only when `success` is a JSON boolean.
///
/// Fields are taken one by one so an oddly typed `error`, `message` or
/// `requestId` never turns a reported failure into data.
fn as_envelope(value: &Value) -> Option<CommandEnvelope> {
    let success = value.get("success")?.as_bool()?;

    Some(CommandEnvelope {
        success,
        data: value.get("data").filter(|data| !data.is_null()).cloned(),
        error: text_field(value.get("error")),
        message: text_field(value.get("message")),
        request_id: text_field(value.get("requestId").or_else(|| value.get("request_id"))),
    })
}

/// Strings are taken as-is, other non-null values in their JSON form.
fn text_field(value: Option<&Value>) -> Option<String> {
    match value? {
        Value::Null => None,
        Value::String(text) => Some(text.clone()),
        other => Some(other.to_string()),
    }
}

/// Decodes an HTTP body, wrapping non-JSON text as a string value.
pub(crate) fn decode_body(body: &str) -> Value {
    if body.trim().is_empty() {
        return Value::Null;
    }
    serde_json::from_str(body).unwrap_or_else(|_| Value::String(body.to_string()))
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use proptest::prelude::*;
    use serde_json::json;

    #[test]
    fn test_local_result_is_wrapped() {
        let envelope = RawReply::from_local(json!({"foo": 1})).normalize();
        assert_eq!(envelope, CommandEnvelope::success(json!({"foo": 1})));
    }

    #[test]
    fn test_envelope_passes_through() {
        let envelope = RawReply::from_local(json!({"success": false, "error": "x"})).normalize();
        assert!(!envelope.success);
        assert_eq!(envelope.error.as_deref(), Some("x"));
        assert!(envelope.data.is_none());
    }

    #[test]
    fn test_failure_without_error_gets_one() {
        let envelope = RawReply::from_http(json!({"success": false})).normalize();
        assert_eq!(envelope.error_message(), Some(""));

        let envelope =
            RawReply::from_http(json!({"success": false, "message": "frozen"})).normalize();
        assert_eq!(envelope.error.as_deref(), Some("frozen"));
    }

    #[test]
    fn test_oddly_typed_fields_keep_failure() {
        let envelope = RawReply::from_http(
            json!({"success": false, "error": {"code": 402, "text": "insufficient balance"}}),
        )
        .normalize();
        assert!(!envelope.success);
        assert!(envelope.data.is_none());
        assert_eq!(
            envelope.error.as_deref(),
            Some(r#"{"code":402,"text":"insufficient balance"}"#)
        );

        let envelope =
            RawReply::from_local(json!({"success": false, "error": "limit", "requestId": 17}))
                .normalize();
        assert!(!envelope.success);
        assert_eq!(envelope.error.as_deref(), Some("limit"));
        assert_eq!(envelope.request_id.as_deref(), Some("17"));

        let envelope =
            RawReply::from_http(json!({"success": false, "message": ["frozen"]})).normalize();
        assert!(!envelope.success);
        assert_eq!(envelope.error.as_deref(), Some(r#"["frozen"]"#));
    }

    #[test]
    fn test_envelope_data_and_snake_case_id() {
        let envelope = RawReply::from_http(
            json!({"success": true, "data": {"amount": 3}, "request_id": "r9", "extra": 1}),
        )
        .normalize();
        assert!(envelope.success);
        assert_eq!(envelope.data, Some(json!({"amount": 3})));
        assert_eq!(envelope.request_id.as_deref(), Some("r9"));
    }

    #[test]
    fn test_non_boolean_success_is_data() {
        let raw = json!({"success": "yes", "amount": 5});
        let envelope = RawReply::from_http(raw.clone()).normalize();
        assert!(envelope.success);
        assert_eq!(envelope.data, Some(raw));
    }

    #[test]
    fn test_request_id_alias() {
        let envelope: CommandEnvelope =
            serde_json::from_value(json!({"success": true, "request_id": "r1"})).expect("parse");
        assert_eq!(envelope.request_id.as_deref(), Some("r1"));

        let out = serde_json::to_value(&envelope).expect("serialize");
        assert_eq!(out, json!({"success": true, "requestId": "r1"}));
    }

    #[test]
    fn test_into_typed() {
        #[derive(Debug, Deserialize, PartialEq)]
        struct Balance {
            amount: u64,
        }

        let ok = CommandEnvelope::success(json!({"amount": 12})).into_typed::<Balance>();
        assert_eq!(ok.data, Some(Balance { amount: 12 }));

        let bad = CommandEnvelope::success(json!({"amount": "many"})).into_typed::<Balance>();
        assert!(!bad.success);
        assert!(bad.error.expect("error").starts_with("JSON error"));
    }

    #[test]
    fn test_into_result() {
        assert_eq!(CommandEnvelope::success(3).into_result(), Ok(Some(3)));
        assert_eq!(
            CommandEnvelope::<u8>::failure("nope").into_result(),
            Err("nope".to_string())
        );
    }

    #[test]
    fn test_decode_body() {
        assert_eq!(decode_body(""), Value::Null);
        assert_eq!(decode_body("{\"a\":1}"), json!({"a": 1}));
        assert_eq!(decode_body("OK"), json!("OK"));
    }

    proptest! {
        #[test]
        fn prop_objects_without_success_wrap(key in "[a-z]{1,8}", n in any::<i64>()) {
            prop_assume!(key != "success");
            let raw = json!({ key: n });
            let envelope = RawReply::from_local(raw.clone()).normalize();
            prop_assert!(envelope.success);
            prop_assert_eq!(envelope.data, Some(raw));
        }

        #[test]
        fn prop_failed_envelopes_always_carry_error(msg in proptest::option::of(".{0,16}")) {
            let mut raw = json!({"success": false});
            if let Some(msg) = &msg {
                raw["error"] = json!(msg);
            }
            let envelope = RawReply::from_http(raw).normalize();
            prop_assert!(!envelope.success);
            prop_assert_eq!(envelope.error.unwrap_or_default(), msg.unwrap_or_default());
        }
    }
}
