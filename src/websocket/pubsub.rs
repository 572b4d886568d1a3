use redis::AsyncCommands;
use redis::Client;

use crate::websocket::bus::FanoutEnvelope;
use crate::websocket::{RoomId, RoomRegistry};

pub async fn publish(client: &Client, room: RoomId, envelope: &str) -> redis::RedisResult<()> {
    let mut conn = client.get_multiplexed_async_connection().await?;
    conn.publish::<_, _, ()>(room.channel(), envelope).await
}

/// Bridge Redis pub/sub back into the local room registry.
///
/// Subscribes to every room channel pattern; each received envelope is
/// delivered to the local subscribers of the parsed room, honouring the
/// envelope's excluded subscriber. Runs until the connection drops.
pub async fn start_listener(client: Client, registry: RoomRegistry) -> redis::RedisResult<()> {
    // Pub/sub needs a dedicated connection, not the multiplexed one
    let conn = client.get_async_connection().await?;
    let mut pubsub = conn.into_pubsub();
    pubsub.psubscribe("conversation:*").await?;
    pubsub.psubscribe("user:*").await?;

    let mut stream = pubsub.on_message();
    use futures_util::StreamExt;
    while let Some(msg) = stream.next().await {
        let channel: String = msg.get_channel_name().into();
        let raw: String = msg.get_payload()?;

        let Some(room) = RoomId::from_channel(&channel) else {
            tracing::warn!(%channel, "pub/sub message on unrecognized channel");
            continue;
        };
        match serde_json::from_str::<FanoutEnvelope>(&raw) {
            Ok(envelope) => {
                registry
                    .broadcast(room, &envelope.payload, envelope.exclude)
                    .await;
            }
            Err(e) => {
                tracing::warn!(error = %e, %channel, "discarding malformed fanout envelope");
            }
        }
    }
    Ok(())
}
