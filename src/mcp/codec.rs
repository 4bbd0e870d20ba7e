//! Envelope codec.
//!
//! Turns raw JSON text into a typed [`Message`] and back.

use serde_json::Value;
use tracing::trace;

use crate::error::{Error, Result};
use crate::mcp::protocol::{JsonRpcNotification, JsonRpcRequest, JsonRpcResponse, JSONRPC_VERSION};

/// A message that can be sent or received.
#[derive(Debug, Clone)]
pub enum Message {
    Request(JsonRpcRequest),
    Response(JsonRpcResponse),
    Notification(JsonRpcNotification),
}

impl Message {
    /// Method name for requests and notifications.
    pub fn method(&self) -> Option<&str> {
        match self {
            Self::Request(req) => Some(&req.method),
            Self::Notification(notif) => Some(&notif.method),
            Self::Response(_) => None,
        }
    }
}

/// Decode one envelope.
///
/// An object with `method` and `id` is a request, `method` without `id` is a
/// notification, and `id` with exactly one of `result`/`error` is a response.
pub fn decode(raw: &str) -> Result<Message> {
    let value: Value = serde_json::from_str(raw.trim())
        .map_err(|e| Error::MalformedMessage(format!("invalid JSON: {}", e)))?;

    let obj = value
        .as_object()
        .ok_or_else(|| Error::MalformedMessage("envelope must be a JSON object".to_string()))?;

    match obj.get("jsonrpc").and_then(Value::as_str) {
        Some(JSONRPC_VERSION) => {}
        other => {
            return Err(Error::MalformedMessage(format!(
                "unsupported jsonrpc version: {:?}",
                other
            )))
        }
    }

    let has_id = obj.get("id").is_some_and(|id| !id.is_null());
    let has_method = obj.contains_key("method");
    let has_result = obj.contains_key("result");
    let has_error = obj.contains_key("error");

    let message = match (has_method, has_id) {
        (true, true) => Message::Request(
            serde_json::from_value(value).map_err(|e| Error::MalformedMessage(e.to_string()))?,
        ),
        (true, false) => Message::Notification(
            serde_json::from_value(value).map_err(|e| Error::MalformedMessage(e.to_string()))?,
        ),
        (false, true) if has_result != has_error => Message::Response(
            serde_json::from_value(value).map_err(|e| Error::MalformedMessage(e.to_string()))?,
        ),
        _ => {
            return Err(Error::MalformedMessage(
                "envelope is neither a request, a notification nor a response".to_string(),
            ))
        }
    };

    trace!("Decoded {:?}", message.method());
    Ok(message)
}

/// Encode one envelope as a single line of JSON.
pub fn encode(message: &Message) -> Result<String> {
    let json = match message {
        Message::Request(req) => serde_json::to_string(req)?,
        Message::Response(res) => serde_json::to_string(res)?,
        Message::Notification(notif) => serde_json::to_string(notif)?,
    };
    Ok(json)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mcp::protocol::RequestId;
    use serde_json::json;

    #[test]
    fn test_decode_request() {
        let msg = decode(r#"{"jsonrpc":"2.0","id":1,"method":"tools/list"}"#).unwrap();
        match msg {
            Message::Request(req) => {
                assert_eq!(req.id, RequestId::Number(1));
                assert_eq!(req.method, "tools/list");
                assert!(req.params.is_none());
            }
            other => panic!("Expected request, got {:?}", other),
        }
    }

    #[test]
    fn test_decode_notification() {
        let msg = decode(r#"{"jsonrpc":"2.0","method":"notifications/initialized"}"#).unwrap();
        assert!(matches!(msg, Message::Notification(_)));
        assert_eq!(msg.method(), Some("notifications/initialized"));
    }

    #[test]
    fn test_decode_response() {
        let msg = decode(r#"{"jsonrpc":"2.0","id":"a","result":{}}"#).unwrap();
        assert!(matches!(msg, Message::Response(_)));
        assert_eq!(msg.method(), None);
    }

    #[test]
    fn test_decode_rejects_garbage() {
        assert!(matches!(decode("not json"), Err(Error::MalformedMessage(_))));
        assert!(matches!(decode("[1,2]"), Err(Error::MalformedMessage(_))));
        assert!(matches!(
            decode(r#"{"id":1,"method":"initialize"}"#),
            Err(Error::MalformedMessage(_))
        ));
        assert!(matches!(
            decode(r#"{"jsonrpc":"2.0","id":1}"#),
            Err(Error::MalformedMessage(_))
        ));
        assert!(matches!(
            decode(r#"{"jsonrpc":"2.0","id":1,"result":{},"error":{"code":1,"message":"x"}}"#),
            Err(Error::MalformedMessage(_))
        ));
        assert!(matches!(
            decode(r#"{"jsonrpc":"2.0","id":1,"method":42}"#),
            Err(Error::MalformedMessage(_))
        ));
    }

    #[test]
    fn test_encode_response_is_single_line() {
        let msg = Message::Response(JsonRpcResponse::success(
            RequestId::Number(3),
            json!({"content": [{"type": "text", "text": "a\nb"}]}),
        ));

        let encoded = encode(&msg).unwrap();
        assert!(!encoded.contains('\n'));
        let value: Value = serde_json::from_str(&encoded).unwrap();
        assert_eq!(value["id"], 3);
        assert_eq!(value["result"]["content"][0]["text"], "a\nb");
    }
}
