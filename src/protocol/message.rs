//! Wire frames for the HTTP command endpoint and the WebSocket stream.

// ============================================================================
// Imports
// ============================================================================

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::identifiers::RequestId;

use super::envelope::{CommandEnvelope, RawReply};

// ============================================================================
// CommandRequest
// ============================================================================

/// Body of `POST {baseUrl}/api/command`.
///
/// # Format
///
/// ```json
/// { "command": "wallet.balance", "payload": { ... } }
/// ```
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CommandRequest<'a> {
    /// Command name.
    pub command: &'a str,
    /// Command payload.
    pub payload: &'a Value,
}

// ============================================================================
// OutboundFrame
// ============================================================================

/// Correlated request written to the stream.
///
/// # Format
///
/// ```json
/// { "command": "wallet.balance", "payload": { ... }, "request_id": "uuid" }
/// ```
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OutboundFrame {
    /// Command name.
    pub command: String,
    /// Command payload.
    pub payload: Value,
    /// Correlation id echoed by the server.
    pub request_id: RequestId,
}

// ============================================================================
// StreamMessage
// ============================================================================

/// Inbound stream frame.
///
/// # Format
///
/// ```json
/// { "type": "event", "event": "balance.updated", "data": { ... }, "timestamp": 1700000000000 }
/// { "type": "response", "request_id": "uuid", "data": { ... } }
/// { "type": "error", "request_id": "uuid", "data": "insufficient balance" }
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StreamMessage {
    /// Frame discriminator.
    #[serde(rename = "type")]
    pub kind: MessageKind,

    /// Event name for push events.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub event: Option<String>,

    /// Frame payload.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,

    /// Correlation id for replies.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_id: Option<RequestId>,

    /// Server timestamp, passed through untouched.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<Value>,
}

impl StreamMessage {
    /// Returns `true` for unsolicited push events.
    #[inline]
    #[must_use]
    pub fn is_event(&self) -> bool {
        self.kind == MessageKind::Event
    }

    /// Returns `true` if this frame answers a request.
    #[inline]
    #[must_use]
    pub fn is_reply(&self) -> bool {
        self.request_id.is_some() && self.kind != MessageKind::Event
    }

    /// Converts a correlated reply into an envelope.
    ///
    /// `response` data is normalized like an HTTP body. `error` frames become
    /// failures whose text is the string payload, or `data.error` /
    /// `data.message` when the payload is an object.
    #[must_use]
    pub fn into_envelope(self) -> CommandEnvelope {
        let request_id = self.request_id.map(|id| id.to_string());

        let envelope = match self.kind {
            MessageKind::Response | MessageKind::Event => {
                RawReply::from_http(self.data.unwrap_or(Value::Null)).normalize()
            }
            MessageKind::Error => CommandEnvelope::failure(error_text(self.data.as_ref())),
        };

        match request_id {
            Some(id) => envelope.with_request_id(id),
            None => envelope,
        }
    }
}

fn error_text(data: Option<&Value>) -> String {
    match data {
        Some(Value::String(text)) => text.clone(),
        Some(value @ Value::Object(_)) => value
            .get("error")
            .or_else(|| value.get("message"))
            .and_then(Value::as_str)
            .map_or_else(|| value.to_string(), str::to_string),
        Some(Value::Null) | None => "stream request failed".to_string(),
        Some(other) => other.to_string(),
    }
}

// ============================================================================
// MessageKind
// ============================================================================

/// Stream frame discriminator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageKind {
    /// Unsolicited push event.
    Event,
    /// Successful reply to a correlated request.
    Response,
    /// Failed reply to a correlated request.
    Error,
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use serde_json::json;

    #[test]
    fn test_outbound_frame_format() {
        let frame = OutboundFrame {
            command: "wallet.balance".to_string(),
            payload: json!({"currency": "USDT"}),
            request_id: RequestId::from("r-1"),
        };
        let value = serde_json::to_value(&frame).expect("serialize");
        assert_eq!(
            value,
            json!({"command": "wallet.balance", "payload": {"currency": "USDT"}, "request_id": "r-1"})
        );
    }

    #[test]
    fn test_command_request_format() {
        let payload = json!({"page": 2});
        let body = CommandRequest {
            command: "transactions.list",
            payload: &payload,
        };
        assert_eq!(
            serde_json::to_value(&body).expect("serialize"),
            json!({"command": "transactions.list", "payload": {"page": 2}})
        );
    }

    #[test]
    fn test_parse_event() {
        let text = r#"{"type":"event","event":"balance.updated","data":{"amount":5},"timestamp":1700000000000}"#;
        let message: StreamMessage = serde_json::from_str(text).expect("parse");
        assert!(message.is_event());
        assert!(!message.is_reply());
        assert_eq!(message.event.as_deref(), Some("balance.updated"));
    }

    #[test]
    fn test_parse_response() {
        let text = r#"{"type":"response","request_id":"abc","data":{"ok":true}}"#;
        let message: StreamMessage = serde_json::from_str(text).expect("parse");
        assert!(message.is_reply());

        let envelope = message.into_envelope();
        assert!(envelope.success);
        assert_eq!(envelope.data, Some(json!({"ok": true})));
        assert_eq!(envelope.request_id.as_deref(), Some("abc"));
    }

    #[test]
    fn test_error_frame_envelope() {
        let text = r#"{"type":"error","request_id":"abc","data":{"message":"insufficient balance"}}"#;
        let message: StreamMessage = serde_json::from_str(text).expect("parse");
        let envelope = message.into_envelope();
        assert!(!envelope.success);
        assert_eq!(envelope.error.as_deref(), Some("insufficient balance"));

        let text = r#"{"type":"error","request_id":"abc"}"#;
        let message: StreamMessage = serde_json::from_str(text).expect("parse");
        assert_eq!(message.into_envelope().error_message(), Some("stream request failed"));
    }

    #[test]
    fn test_response_with_embedded_envelope() {
        let text = r#"{"type":"response","request_id":"z","data":{"success":false,"error":"limit"}}"#;
        let message: StreamMessage = serde_json::from_str(text).expect("parse");
        let envelope = message.into_envelope();
        assert!(!envelope.success);
        assert_eq!(envelope.error.as_deref(), Some("limit"));
    }

    #[test]
    fn test_unknown_type_rejected() {
        let text = r#"{"type":"ping"}"#;
        assert!(serde_json::from_str::<StreamMessage>(text).is_err());
    }
}
