use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::error::AppError;
use crate::models::message::MessageKind;

/// Maximum number of characters carried in a conversation's denormalized
/// last-message preview. The full body lives on the message row.
pub const PREVIEW_MAX_CHARS: usize = 120;

/// The unordered pair of users in a direct conversation.
///
/// Stored normalized (`low < high` by UUID byte order) so the pair itself is
/// the uniqueness key: `{alice, bob}` and `{bob, alice}` map to the same
/// value, and a self-pair cannot be constructed at all.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ParticipantPair {
    low: Uuid,
    high: Uuid,
}

impl ParticipantPair {
    pub fn new(a: Uuid, b: Uuid) -> Result<Self, AppError> {
        if a == b {
            return Err(AppError::InvalidParticipants);
        }
        Ok(Self::from_stored(a, b))
    }

    /// Rebuild a pair from persisted columns. The database CHECK constraint
    /// guarantees distinctness; normalization is reapplied regardless.
    pub fn from_stored(a: Uuid, b: Uuid) -> Self {
        if a <= b {
            Self { low: a, high: b }
        } else {
            Self { low: b, high: a }
        }
    }

    pub fn low(&self) -> Uuid {
        self.low
    }

    pub fn high(&self) -> Uuid {
        self.high
    }

    pub fn contains(&self, user_id: Uuid) -> bool {
        self.low == user_id || self.high == user_id
    }

    /// The other participant, if `user_id` is one of the two.
    pub fn peer_of(&self, user_id: Uuid) -> Option<Uuid> {
        if user_id == self.low {
            Some(self.high)
        } else if user_id == self.high {
            Some(self.low)
        } else {
            None
        }
    }
}

/// A persistent two-party chat thread. Never deleted, only deactivated.
#[derive(Debug, Clone, Serialize)]
pub struct Conversation {
    pub id: Uuid,
    pub participants: ParticipantPair,
    pub last_message_preview: String,
    pub last_message_at: DateTime<Utc>,
    pub active: bool,
    pub created_at: DateTime<Utc>,
}

/// Derive the preview text stored on the conversation row.
///
/// Text bodies are trimmed and truncated; attachments get a fixed
/// placeholder so file references never leak into conversation lists.
pub fn preview_of(kind: MessageKind, body: &str) -> String {
    match kind {
        MessageKind::Text => body.trim().chars().take(PREVIEW_MAX_CHARS).collect(),
        MessageKind::Image => "[image]".to_string(),
        MessageKind::File => "[file]".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pair_is_order_independent() {
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();

        let ab = ParticipantPair::new(a, b).unwrap();
        let ba = ParticipantPair::new(b, a).unwrap();

        assert_eq!(ab, ba);
        assert!(ab.low() < ab.high());
    }

    #[test]
    fn pair_rejects_self_conversation() {
        let a = Uuid::new_v4();
        assert!(matches!(
            ParticipantPair::new(a, a),
            Err(AppError::InvalidParticipants)
        ));
    }

    #[test]
    fn pair_membership_and_peer() {
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let other = Uuid::new_v4();
        let pair = ParticipantPair::new(a, b).unwrap();

        assert!(pair.contains(a));
        assert!(pair.contains(b));
        assert!(!pair.contains(other));

        assert_eq!(pair.peer_of(a), Some(b));
        assert_eq!(pair.peer_of(b), Some(a));
        assert_eq!(pair.peer_of(other), None);
    }

    #[test]
    fn preview_trims_and_truncates_text() {
        let long = format!("  {}  ", "x".repeat(500));
        let preview = preview_of(MessageKind::Text, &long);
        assert_eq!(preview.chars().count(), PREVIEW_MAX_CHARS);
        assert!(!preview.starts_with(' '));
    }

    #[test]
    fn preview_masks_attachments() {
        assert_eq!(preview_of(MessageKind::Image, "s3://bucket/key"), "[image]");
        assert_eq!(preview_of(MessageKind::File, "s3://bucket/key"), "[file]");
    }
}
