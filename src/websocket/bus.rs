//! Pluggable room fan-out.
//!
//! A single gateway instance serves rooms straight out of the in-process
//! registry. Horizontally scaled deployments route every broadcast through
//! Redis pub/sub instead, so an event published on one instance reaches
//! subscribers connected to any other; a listener task bridges channel
//! messages back into each instance's local registry.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc::UnboundedSender;

use crate::websocket::{pubsub, RoomId, RoomRegistry, SubscriberId};

#[async_trait]
pub trait RoomBus: Send + Sync {
    async fn join(&self, room: RoomId, id: SubscriberId, sender: UnboundedSender<String>);
    async fn leave(&self, room: RoomId, id: SubscriberId);
    async fn leave_all(&self, id: SubscriberId);
    /// Deliver a payload to every member of a room. `exclude` suppresses
    /// delivery to one local subscriber (the originating connection).
    async fn broadcast(&self, room: RoomId, payload: &str, exclude: Option<SubscriberId>);
}

/// What travels over the Redis channel: the serialized event plus the
/// originating subscriber to skip on local delivery. Remote instances never
/// hold the excluded subscriber, so the skip is naturally scoped.
#[derive(Debug, Serialize, Deserialize)]
pub struct FanoutEnvelope {
    pub exclude: Option<SubscriberId>,
    pub payload: String,
}

/// In-process fan-out for single-instance deployments.
pub struct LocalRoomBus {
    registry: RoomRegistry,
}

impl LocalRoomBus {
    pub fn new(registry: RoomRegistry) -> Self {
        Self { registry }
    }
}

#[async_trait]
impl RoomBus for LocalRoomBus {
    async fn join(&self, room: RoomId, id: SubscriberId, sender: UnboundedSender<String>) {
        self.registry.join(room, id, sender).await;
    }

    async fn leave(&self, room: RoomId, id: SubscriberId) {
        self.registry.leave(room, id).await;
    }

    async fn leave_all(&self, id: SubscriberId) {
        self.registry.leave_all(id).await;
    }

    async fn broadcast(&self, room: RoomId, payload: &str, exclude: Option<SubscriberId>) {
        self.registry.broadcast(room, payload, exclude).await;
    }
}

/// Redis-backed fan-out for multi-instance deployments.
///
/// Broadcasts only publish; local delivery happens when the instance's own
/// pub/sub listener receives the message back, which keeps delivery
/// single-path and identical for local and remote subscribers.
pub struct RedisRoomBus {
    registry: RoomRegistry,
    client: redis::Client,
}

impl RedisRoomBus {
    pub fn new(registry: RoomRegistry, client: redis::Client) -> Self {
        Self { registry, client }
    }
}

#[async_trait]
impl RoomBus for RedisRoomBus {
    async fn join(&self, room: RoomId, id: SubscriberId, sender: UnboundedSender<String>) {
        self.registry.join(room, id, sender).await;
    }

    async fn leave(&self, room: RoomId, id: SubscriberId) {
        self.registry.leave(room, id).await;
    }

    async fn leave_all(&self, id: SubscriberId) {
        self.registry.leave_all(id).await;
    }

    async fn broadcast(&self, room: RoomId, payload: &str, exclude: Option<SubscriberId>) {
        let envelope = FanoutEnvelope {
            exclude,
            payload: payload.to_string(),
        };
        let encoded = match serde_json::to_string(&envelope) {
            Ok(s) => s,
            Err(e) => {
                tracing::error!(error = %e, "failed to encode fanout envelope");
                return;
            }
        };
        if let Err(e) = pubsub::publish(&self.client, room, &encoded).await {
            tracing::error!(error = %e, room = %room.channel(), "redis publish failed; falling back to local delivery");
            self.registry.broadcast(room, payload, exclude).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::mpsc::unbounded_channel;
    use uuid::Uuid;

    #[tokio::test]
    async fn local_bus_reaches_every_member_of_the_room() {
        let bus = LocalRoomBus::new(RoomRegistry::new());
        let room = RoomId::Conversation(Uuid::new_v4());

        // Two devices of the same user plus the peer: all three converge.
        let mut receivers = Vec::new();
        for _ in 0..3 {
            let id = SubscriberId::new();
            let (tx, rx) = unbounded_channel();
            bus.join(room, id, tx).await;
            receivers.push(rx);
        }

        bus.broadcast(room, "message-created", None).await;
        for rx in receivers.iter_mut() {
            assert_eq!(rx.recv().await.as_deref(), Some("message-created"));
        }
    }

    #[tokio::test]
    async fn local_bus_scopes_broadcast_to_the_room() {
        let bus = LocalRoomBus::new(RoomRegistry::new());
        let room_a = RoomId::Conversation(Uuid::new_v4());
        let room_b = RoomId::Conversation(Uuid::new_v4());

        let id_a = SubscriberId::new();
        let (tx_a, mut rx_a) = unbounded_channel();
        bus.join(room_a, id_a, tx_a).await;

        let id_b = SubscriberId::new();
        let (tx_b, mut rx_b) = unbounded_channel();
        bus.join(room_b, id_b, tx_b).await;

        bus.broadcast(room_a, "only-a", None).await;
        assert_eq!(rx_a.recv().await.as_deref(), Some("only-a"));
        assert!(rx_b.try_recv().is_err());
    }

    #[test]
    fn fanout_envelope_round_trips() {
        let envelope = FanoutEnvelope {
            exclude: Some(SubscriberId::new()),
            payload: "{\"type\":\"user-typing\"}".to_string(),
        };
        let encoded = serde_json::to_string(&envelope).unwrap();
        let decoded: FanoutEnvelope = serde_json::from_str(&encoded).unwrap();
        assert_eq!(decoded.exclude, envelope.exclude);
        assert_eq!(decoded.payload, envelope.payload);
    }
}
