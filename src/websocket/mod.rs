use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{
    mpsc::{UnboundedReceiver, UnboundedSender},
    RwLock,
};
use uuid::Uuid;

pub mod bus;
pub mod events;
pub mod handlers;
pub mod message_types;
pub mod pubsub;

/// A realtime fan-out group: one per conversation, plus one private room
/// per user for out-of-band notifications.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RoomId {
    Conversation(Uuid),
    User(Uuid),
}

impl RoomId {
    /// Channel name used for Redis pub/sub and logging.
    pub fn channel(&self) -> String {
        match self {
            RoomId::Conversation(id) => format!("conversation:{id}"),
            RoomId::User(id) => format!("user:{id}"),
        }
    }

    /// Parse a pub/sub channel name back into a room. Accepts both
    /// `conversation:<uuid>` and `conversation:<uuid>:<suffix>`.
    pub fn from_channel(channel: &str) -> Option<RoomId> {
        let (prefix, rest) = channel.split_once(':')?;
        let id_part = rest.split(':').next().unwrap_or(rest);
        let id = Uuid::parse_str(id_part).ok()?;
        match prefix {
            "conversation" => Some(RoomId::Conversation(id)),
            "user" => Some(RoomId::User(id)),
            _ => None,
        }
    }
}

/// Unique identifier for one realtime connection's subscription.
///
/// Every connection registers exactly one outbound channel; the same
/// subscriber ID joins any number of rooms and allows precise cleanup when
/// the connection closes.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize,
)]
pub struct SubscriberId(Uuid);

impl SubscriberId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for SubscriberId {
    fn default() -> Self {
        Self::new()
    }
}

struct Subscriber {
    id: SubscriberId,
    sender: UnboundedSender<String>,
}

/// In-process room membership: room -> subscriber channels.
///
/// Dead senders are pruned on broadcast, so a slow consumer whose receiver
/// was dropped never blocks or leaks.
#[derive(Default, Clone)]
pub struct RoomRegistry {
    inner: Arc<RwLock<HashMap<RoomId, Vec<Subscriber>>>>,
}

impl RoomRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a subscriber to a room. Joining a room the subscriber is
    /// already in is a no-op.
    pub async fn join(&self, room: RoomId, id: SubscriberId, sender: UnboundedSender<String>) {
        let mut guard = self.inner.write().await;
        let members = guard.entry(room).or_default();
        if members.iter().any(|s| s.id == id) {
            return;
        }
        members.push(Subscriber { id, sender });
        tracing::debug!(room = %room.channel(), members = members.len(), "subscriber joined");
    }

    /// Remove a subscriber from a room. Leaving a room not joined is a
    /// no-op.
    pub async fn leave(&self, room: RoomId, id: SubscriberId) {
        let mut guard = self.inner.write().await;
        if let Some(members) = guard.get_mut(&room) {
            members.retain(|s| s.id != id);
            if members.is_empty() {
                guard.remove(&room);
            }
        }
    }

    /// Drop every membership held by a subscriber. Called on disconnect.
    pub async fn leave_all(&self, id: SubscriberId) {
        let mut guard = self.inner.write().await;
        guard.retain(|_, members| {
            members.retain(|s| s.id != id);
            !members.is_empty()
        });
    }

    /// Send a payload to every member of a room, optionally skipping one
    /// subscriber (used for typing indicators, which never echo back).
    pub async fn broadcast(&self, room: RoomId, payload: &str, exclude: Option<SubscriberId>) {
        let mut guard = self.inner.write().await;
        if let Some(members) = guard.get_mut(&room) {
            members.retain(|s| {
                if Some(s.id) == exclude {
                    return true;
                }
                s.sender.send(payload.to_string()).is_ok()
            });
            if members.is_empty() {
                guard.remove(&room);
            }
        }
    }

    pub async fn member_count(&self, room: RoomId) -> usize {
        let guard = self.inner.read().await;
        guard.get(&room).map(|v| v.len()).unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::mpsc::unbounded_channel;

    #[test]
    fn room_channel_round_trip() {
        let id = Uuid::new_v4();
        for room in [RoomId::Conversation(id), RoomId::User(id)] {
            assert_eq!(RoomId::from_channel(&room.channel()), Some(room));
        }
        assert_eq!(RoomId::from_channel("nonsense"), None);
        assert_eq!(RoomId::from_channel("conversation:not-a-uuid"), None);
    }

    #[tokio::test]
    async fn join_is_idempotent() {
        let registry = RoomRegistry::new();
        let room = RoomId::Conversation(Uuid::new_v4());
        let id = SubscriberId::new();
        let (tx, mut rx) = unbounded_channel();

        registry.join(room, id, tx.clone()).await;
        registry.join(room, id, tx).await;
        assert_eq!(registry.member_count(room).await, 1);

        registry.broadcast(room, "hello", None).await;
        assert_eq!(rx.recv().await.as_deref(), Some("hello"));
        assert!(rx.try_recv().is_err(), "double join must not double-deliver");
    }

    #[tokio::test]
    async fn leave_unjoined_room_is_noop() {
        let registry = RoomRegistry::new();
        let room = RoomId::Conversation(Uuid::new_v4());
        registry.leave(room, SubscriberId::new()).await;
        assert_eq!(registry.member_count(room).await, 0);
    }

    #[tokio::test]
    async fn broadcast_skips_excluded_subscriber() {
        let registry = RoomRegistry::new();
        let room = RoomId::Conversation(Uuid::new_v4());

        let sender_id = SubscriberId::new();
        let (sender_tx, mut sender_rx) = unbounded_channel();
        let other_id = SubscriberId::new();
        let (other_tx, mut other_rx) = unbounded_channel();

        registry.join(room, sender_id, sender_tx).await;
        registry.join(room, other_id, other_tx).await;

        registry.broadcast(room, "typing", Some(sender_id)).await;

        assert_eq!(other_rx.recv().await.as_deref(), Some("typing"));
        assert!(sender_rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn dead_subscribers_are_pruned_on_broadcast() {
        let registry = RoomRegistry::new();
        let room = RoomId::Conversation(Uuid::new_v4());

        let live_id = SubscriberId::new();
        let (live_tx, mut live_rx) = unbounded_channel();
        let dead_id = SubscriberId::new();
        let (dead_tx, dead_rx) = unbounded_channel();
        drop(dead_rx);

        registry.join(room, live_id, live_tx).await;
        registry.join(room, dead_id, dead_tx).await;
        assert_eq!(registry.member_count(room).await, 2);

        registry.broadcast(room, "ping", None).await;
        assert_eq!(live_rx.recv().await.as_deref(), Some("ping"));
        assert_eq!(registry.member_count(room).await, 1);
    }

    #[tokio::test]
    async fn leave_all_clears_every_room() {
        let registry = RoomRegistry::new();
        let id = SubscriberId::new();
        let (tx, _rx) = unbounded_channel();

        let a = RoomId::Conversation(Uuid::new_v4());
        let b = RoomId::User(Uuid::new_v4());
        registry.join(a, id, tx.clone()).await;
        registry.join(b, id, tx).await;

        registry.leave_all(id).await;
        assert_eq!(registry.member_count(a).await, 0);
        assert_eq!(registry.member_count(b).await, 0);
    }
}
