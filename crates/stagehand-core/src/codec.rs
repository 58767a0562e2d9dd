//! JSON text framing for the control channel.
//!
//! One WebSocket text frame carries exactly one JSON object.

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::{ResultExt, StageError, StageResult};
use crate::messages::Inbound;

/// Encode an outbound value as a JSON text frame.
pub fn encode<T: Serialize>(value: &T) -> StageResult<String> {
    Ok(serde_json::to_string(value)?)
}

/// Decode an inbound text frame into its action name and body.
///
/// Unparseable JSON and non-object payloads are tagged `json_decode_error`;
/// a missing or non-string `action` is tagged `dispatch`.
pub fn decode_inbound(text: &str) -> StageResult<Inbound> {
    let body: serde_json::Value = serde_json::from_str(text).tagged("json_decode_error")?;
    if !body.is_object() {
        return Err(StageError::InvalidMessage("message must be a JSON object".into())
            .tagged("json_decode_error"));
    }
    let action = match body.get("action").and_then(|a| a.as_str()) {
        Some(a) if !a.trim().is_empty() => a.to_string(),
        _ => {
            return Err(
                StageError::InvalidMessage("missing 'action' field".into()).tagged("dispatch")
            )
        }
    };
    Ok(Inbound { action, body })
}

/// Deserialize a typed request from an inbound body.
pub fn parse_request<T: DeserializeOwned>(body: &serde_json::Value) -> StageResult<T> {
    T::deserialize(body)
        .map_err(StageError::from)
        .tagged("invalid_payload")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::messages::{LoadScriptRequest, ServerMessage};

    #[test]
    fn decode_valid_action() {
        let msg = decode_inbound(r#"{"action":"load_script","filename":"a.txt"}"#).unwrap();
        assert_eq!(msg.action, "load_script");
        let req: LoadScriptRequest = parse_request(&msg.body).unwrap();
        assert_eq!(req.filename.as_deref(), Some("a.txt"));
    }

    #[test]
    fn malformed_json_is_tagged() {
        let err = decode_inbound("{not json").unwrap_err();
        assert_eq!(err.context(), Some("json_decode_error"));
    }

    #[test]
    fn non_object_is_rejected() {
        let err = decode_inbound("[1,2,3]").unwrap_err();
        assert_eq!(err.context(), Some("json_decode_error"));
    }

    #[test]
    fn missing_action_is_dispatch_error() {
        let err = decode_inbound(r#"{"filename":"a.txt"}"#).unwrap_err();
        assert_eq!(err.context(), Some("dispatch"));
        let err = decode_inbound(r#"{"action":42}"#).unwrap_err();
        assert_eq!(err.context(), Some("dispatch"));
    }

    #[test]
    fn wrong_field_type_is_invalid_payload() {
        let body = serde_json::json!({"action":"load_script","filename":7});
        let err = parse_request::<LoadScriptRequest>(&body).unwrap_err();
        assert_eq!(err.context(), Some("invalid_payload"));
    }

    #[test]
    fn encode_produces_single_object() {
        let text = encode(&ServerMessage::EndOfScript {
            message: "done".into(),
        })
        .unwrap();
        assert_eq!(text, r#"{"type":"end_of_script","message":"done"}"#);
    }
}
