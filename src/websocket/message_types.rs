use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::message::MessageKind;

/// Events a client may send over the realtime connection.
///
/// Payloads are validated against these tagged shapes at the gateway
/// boundary; anything that does not parse is answered with an `error`
/// event and never reaches the chat service.
#[derive(Debug, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum GatewayRequest {
    #[serde(rename = "join-room")]
    JoinRoom { conversation_id: Uuid },

    #[serde(rename = "leave-room")]
    LeaveRoom { conversation_id: Uuid },

    #[serde(rename = "send-message")]
    SendMessage {
        conversation_id: Uuid,
        body: String,
        #[serde(default)]
        kind: MessageKind,
    },

    #[serde(rename = "typing-start")]
    TypingStart { conversation_id: Uuid },

    #[serde(rename = "typing-stop")]
    TypingStop { conversation_id: Uuid },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_join_room() {
        let id = Uuid::new_v4();
        let raw = format!(r#"{{"type":"join-room","conversation_id":"{id}"}}"#);
        match serde_json::from_str::<GatewayRequest>(&raw).unwrap() {
            GatewayRequest::JoinRoom { conversation_id } => assert_eq!(conversation_id, id),
            other => panic!("unexpected request: {other:?}"),
        }
    }

    #[test]
    fn send_message_kind_defaults_to_text() {
        let id = Uuid::new_v4();
        let raw = format!(r#"{{"type":"send-message","conversation_id":"{id}","body":"hi"}}"#);
        match serde_json::from_str::<GatewayRequest>(&raw).unwrap() {
            GatewayRequest::SendMessage { kind, body, .. } => {
                assert_eq!(kind, MessageKind::Text);
                assert_eq!(body, "hi");
            }
            other => panic!("unexpected request: {other:?}"),
        }
    }

    #[test]
    fn rejects_unknown_event_type() {
        let raw = r#"{"type":"self-destruct","conversation_id":"00000000-0000-0000-0000-000000000000"}"#;
        assert!(serde_json::from_str::<GatewayRequest>(raw).is_err());
    }

    #[test]
    fn rejects_missing_fields() {
        assert!(serde_json::from_str::<GatewayRequest>(r#"{"type":"join-room"}"#).is_err());
        assert!(serde_json::from_str::<GatewayRequest>("not json at all").is_err());
    }
}
