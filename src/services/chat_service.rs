use sqlx::{Pool, Postgres};
use std::time::Duration;
use uuid::Uuid;

use crate::error::AppResult;
use crate::metrics;
use crate::models::message::{Message, MessageKind};
use crate::routes::messages::MessageDto;
use crate::services::conversation_service::{ConversationService, ConversationSummary};
use crate::services::message_service::MessageService;
use crate::websocket::bus::RoomBus;
use crate::websocket::events::GatewayEvent;
use crate::websocket::RoomId;

const MAX_SEND_ATTEMPTS: u32 = 3;
const RETRY_BACKOFF: Duration = Duration::from_millis(50);

/// Orchestrates the store and the room bus: persist first, then fan out.
pub struct ChatService;

impl ChatService {
    /// Persist a message and broadcast `message-created` to the
    /// conversation's room.
    ///
    /// The broadcast happens only after the append succeeded, so "durably
    /// stored" happens-before "visible to other clients", and a failed send
    /// never produces an event. The sender is not excluded from the
    /// broadcast: their other devices converge on the same transcript, and
    /// the round-tripped event is the client's only success signal.
    pub async fn send(
        db: &Pool<Postgres>,
        rooms: &dyn RoomBus,
        conversation_id: Uuid,
        sender_id: Uuid,
        body: &str,
        kind: MessageKind,
    ) -> AppResult<Message> {
        let message =
            Self::append_with_retry(db, conversation_id, sender_id, body, kind).await?;
        metrics::MESSAGES_PERSISTED_TOTAL.inc();

        let event = GatewayEvent::MessageCreated {
            message: MessageDto::from(&message),
        };
        match event.to_payload() {
            Ok(payload) => {
                rooms
                    .broadcast(RoomId::Conversation(conversation_id), &payload, None)
                    .await;
            }
            Err(e) => {
                tracing::error!(error = %e, %conversation_id, "failed to serialize message-created event");
            }
        }

        Ok(message)
    }

    /// Append with a bounded retry on transient storage failures.
    /// Validation errors surface immediately; nothing is ever broadcast for
    /// a message that did not persist.
    async fn append_with_retry(
        db: &Pool<Postgres>,
        conversation_id: Uuid,
        sender_id: Uuid,
        body: &str,
        kind: MessageKind,
    ) -> AppResult<Message> {
        let mut attempt = 1u32;
        loop {
            match MessageService::append(db, conversation_id, sender_id, body, kind).await {
                Ok(message) => return Ok(message),
                Err(e) if e.is_retryable() && attempt < MAX_SEND_ATTEMPTS => {
                    tracing::warn!(error = %e, attempt, "transient storage failure, retrying send");
                    tokio::time::sleep(RETRY_BACKOFF * attempt).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }

    pub async fn list_conversations(
        db: &Pool<Postgres>,
        user_id: Uuid,
    ) -> AppResult<Vec<ConversationSummary>> {
        ConversationService::list_for_user(db, user_id).await
    }

    /// Mark the conversation read for `reader_id` and notify the room with
    /// a read receipt. Idempotent; a second call updates nothing and stays
    /// silent.
    pub async fn mark_conversation_read(
        db: &Pool<Postgres>,
        rooms: &dyn RoomBus,
        conversation_id: Uuid,
        reader_id: Uuid,
    ) -> AppResult<u64> {
        let updated = MessageService::mark_read(db, conversation_id, reader_id).await?;

        if updated > 0 {
            let event = GatewayEvent::ConversationRead {
                conversation_id,
                user_id: reader_id,
                updated,
            };
            match event.to_payload() {
                Ok(payload) => {
                    rooms
                        .broadcast(RoomId::Conversation(conversation_id), &payload, None)
                        .await;
                }
                Err(e) => {
                    tracing::error!(error = %e, %conversation_id, "failed to serialize conversation-read event");
                }
            }
        }

        Ok(updated)
    }
}
