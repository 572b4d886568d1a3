//! Outbound realtime events.
//!
//! Every event serializes to a flat JSON object with a `type` tag and a
//! `timestamp`, stamped in one place. Handlers never hand-build event JSON.

use chrono::Utc;
use serde::Serialize;
use uuid::Uuid;

use crate::error::AppError;
use crate::routes::messages::MessageDto;

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type")]
pub enum GatewayEvent {
    /// A message was durably stored. Delivered to every connection in the
    /// conversation's room, the sender's other devices included.
    #[serde(rename = "message-created")]
    MessageCreated { message: MessageDto },

    #[serde(rename = "user-typing")]
    UserTyping { conversation_id: Uuid, user_id: Uuid },

    #[serde(rename = "user-stopped-typing")]
    UserStoppedTyping { conversation_id: Uuid, user_id: Uuid },

    /// Read receipt: `user_id` has marked the conversation read.
    #[serde(rename = "conversation-read")]
    ConversationRead {
        conversation_id: Uuid,
        user_id: Uuid,
        updated: u64,
    },

    /// Reported to the originating connection only, never broadcast.
    #[serde(rename = "error")]
    Error { code: String, description: String },
}

impl GatewayEvent {
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::MessageCreated { .. } => "message-created",
            Self::UserTyping { .. } => "user-typing",
            Self::UserStoppedTyping { .. } => "user-stopped-typing",
            Self::ConversationRead { .. } => "conversation-read",
            Self::Error { .. } => "error",
        }
    }

    pub fn from_error(err: &AppError) -> Self {
        Self::Error {
            code: err.code().to_string(),
            description: err.to_string(),
        }
    }

    /// Serialize for delivery, stamping the envelope timestamp.
    pub fn to_payload(&self) -> Result<String, serde_json::Error> {
        let mut value = serde_json::to_value(self)?;
        value["timestamp"] = serde_json::Value::String(Utc::now().to_rfc3339());
        serde_json::to_string(&value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn event_type_matches_wire_tag() {
        let event = GatewayEvent::UserTyping {
            conversation_id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
        };
        assert_eq!(event.event_type(), "user-typing");

        let payload = event.to_payload().unwrap();
        let parsed: serde_json::Value = serde_json::from_str(&payload).unwrap();
        assert_eq!(parsed["type"], "user-typing");
    }

    #[test]
    fn payload_is_flat_and_timestamped() {
        let conversation_id = Uuid::new_v4();
        let user_id = Uuid::new_v4();
        let event = GatewayEvent::ConversationRead {
            conversation_id,
            user_id,
            updated: 3,
        };

        let parsed: serde_json::Value =
            serde_json::from_str(&event.to_payload().unwrap()).unwrap();
        assert_eq!(parsed["type"], "conversation-read");
        assert_eq!(parsed["conversation_id"], conversation_id.to_string());
        assert_eq!(parsed["user_id"], user_id.to_string());
        assert_eq!(parsed["updated"], 3);
        assert!(parsed["timestamp"].is_string());
    }

    #[test]
    fn error_event_carries_stable_code() {
        let event = GatewayEvent::from_error(&AppError::EmptyBody);
        let parsed: serde_json::Value =
            serde_json::from_str(&event.to_payload().unwrap()).unwrap();
        assert_eq!(parsed["type"], "error");
        assert_eq!(parsed["code"], "empty_body");
        assert!(parsed["description"].is_string());
    }
}
