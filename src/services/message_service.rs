use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use chrono::{DateTime, Utc};
use sqlx::{Pool, Postgres, Row};
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::models::conversation::preview_of;
use crate::models::message::{Message, MessageKind};
use crate::services::conversation_service::ConversationService;

/// Hard cap on a single history page.
pub const HISTORY_MAX_PAGE: i64 = 200;

/// Restartable position in a conversation's history: the last-seen
/// `(created_at, id)` pair, carried opaquely by clients.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Cursor {
    pub created_at: DateTime<Utc>,
    pub id: Uuid,
}

impl Cursor {
    pub fn encode(&self) -> String {
        // timestamptz is microsecond-precise, so micros round-trip exactly
        let raw = format!("{}:{}", self.created_at.timestamp_micros(), self.id);
        STANDARD.encode(raw)
    }

    pub fn decode(input: &str) -> AppResult<Self> {
        let invalid = || AppError::BadRequest("invalid history cursor".into());

        let bytes = STANDARD.decode(input).map_err(|_| invalid())?;
        let raw = String::from_utf8(bytes).map_err(|_| invalid())?;
        let (micros, id) = raw.split_once(':').ok_or_else(invalid)?;

        let micros: i64 = micros.parse().map_err(|_| invalid())?;
        let created_at = DateTime::from_timestamp_micros(micros).ok_or_else(invalid)?;
        let id = Uuid::parse_str(id).map_err(|_| invalid())?;

        Ok(Self { created_at, id })
    }
}

/// One page of ascending history plus the cursor to resume from, if the
/// page was full.
#[derive(Debug)]
pub struct HistoryPage {
    pub messages: Vec<Message>,
    pub next_cursor: Option<Cursor>,
}

const MESSAGE_COLUMNS: &str =
    "id, conversation_id, sender_id, kind, body, read_flag, read_at, created_at";

pub struct MessageService;

impl MessageService {
    /// Persist a message, then refresh the owning conversation's preview.
    ///
    /// The message row is written first: a concurrent reader may observe a
    /// stale preview, but never a preview pointing past retrievable
    /// history. `GREATEST` keeps last_message_at monotonic when appends
    /// from two gateway instances interleave.
    pub async fn append(
        db: &Pool<Postgres>,
        conversation_id: Uuid,
        sender_id: Uuid,
        body: &str,
        kind: MessageKind,
    ) -> AppResult<Message> {
        let conversation = ConversationService::find(db, conversation_id).await?;
        if !conversation.participants.contains(sender_id) {
            return Err(AppError::InvalidSender);
        }

        let body = match kind {
            MessageKind::Text => {
                let trimmed = body.trim();
                if trimmed.is_empty() {
                    return Err(AppError::EmptyBody);
                }
                trimmed.to_string()
            }
            MessageKind::Image | MessageKind::File => {
                if body.trim().is_empty() {
                    return Err(AppError::BadRequest("attachment reference is empty".into()));
                }
                body.to_string()
            }
        };

        let id = Uuid::new_v4();
        let row = sqlx::query(
            "INSERT INTO messages (id, conversation_id, sender_id, kind, body) \
             VALUES ($1, $2, $3, $4, $5) \
             RETURNING created_at",
        )
        .bind(id)
        .bind(conversation_id)
        .bind(sender_id)
        .bind(kind.as_str())
        .bind(&body)
        .fetch_one(db)
        .await?;
        let created_at: DateTime<Utc> = row.get("created_at");

        sqlx::query(
            "UPDATE conversations \
             SET last_message_preview = $2, \
                 last_message_at = GREATEST(last_message_at, $3) \
             WHERE id = $1",
        )
        .bind(conversation_id)
        .bind(preview_of(kind, &body))
        .bind(created_at)
        .execute(db)
        .await?;

        Ok(Message {
            id,
            conversation_id,
            sender_id,
            kind,
            body,
            read_flag: false,
            read_at: None,
            created_at,
        })
    }

    /// One page of history in ascending `(created_at, id)` order — natural
    /// chat reading order. Pages chain through the returned cursor with no
    /// duplicates and no gaps.
    pub async fn history(
        db: &Pool<Postgres>,
        conversation_id: Uuid,
        limit: i64,
        cursor: Option<Cursor>,
    ) -> AppResult<HistoryPage> {
        let limit = limit.clamp(1, HISTORY_MAX_PAGE);

        let rows = match &cursor {
            Some(c) => {
                sqlx::query(&format!(
                    "SELECT {MESSAGE_COLUMNS} FROM messages \
                     WHERE conversation_id = $1 AND (created_at, id) > ($2, $3) \
                     ORDER BY created_at ASC, id ASC \
                     LIMIT $4"
                ))
                .bind(conversation_id)
                .bind(c.created_at)
                .bind(c.id)
                .bind(limit)
                .fetch_all(db)
                .await?
            }
            None => {
                sqlx::query(&format!(
                    "SELECT {MESSAGE_COLUMNS} FROM messages \
                     WHERE conversation_id = $1 \
                     ORDER BY created_at ASC, id ASC \
                     LIMIT $2"
                ))
                .bind(conversation_id)
                .bind(limit)
                .fetch_all(db)
                .await?
            }
        };

        let messages: Vec<Message> = rows
            .into_iter()
            .map(|r| {
                let kind: String = r.get("kind");
                Message {
                    id: r.get("id"),
                    conversation_id: r.get("conversation_id"),
                    sender_id: r.get("sender_id"),
                    kind: MessageKind::from_str(&kind),
                    body: r.get("body"),
                    read_flag: r.get("read_flag"),
                    read_at: r.get("read_at"),
                    created_at: r.get("created_at"),
                }
            })
            .collect();

        let next_cursor = if messages.len() as i64 == limit {
            messages.last().map(|m| Cursor {
                created_at: m.created_at,
                id: m.id,
            })
        } else {
            None
        };

        Ok(HistoryPage {
            messages,
            next_cursor,
        })
    }

    /// Mark every unread message from other senders as read.
    ///
    /// Single conditional UPDATE, so the false-to-true transition is atomic
    /// and idempotent: a second call matches nothing and updates zero rows.
    pub async fn mark_read(
        db: &Pool<Postgres>,
        conversation_id: Uuid,
        reader_id: Uuid,
    ) -> AppResult<u64> {
        ConversationService::find(db, conversation_id).await?;

        let result = sqlx::query(
            "UPDATE messages \
             SET read_flag = TRUE, read_at = now() \
             WHERE conversation_id = $1 AND sender_id <> $2 AND read_flag = FALSE",
        )
        .bind(conversation_id)
        .bind(reader_id)
        .execute(db)
        .await?;

        Ok(result.rows_affected())
    }

    pub async fn unread_count(
        db: &Pool<Postgres>,
        conversation_id: Uuid,
        user_id: Uuid,
    ) -> AppResult<i64> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM messages \
             WHERE conversation_id = $1 AND sender_id <> $2 AND read_flag = FALSE",
        )
        .bind(conversation_id)
        .bind(user_id)
        .fetch_one(db)
        .await?;

        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cursor_round_trips() {
        let cursor = Cursor {
            created_at: Utc::now(),
            id: Uuid::new_v4(),
        };
        let decoded = Cursor::decode(&cursor.encode()).unwrap();
        // timestamptz carries microseconds; the encoding must not lose them
        assert_eq!(
            decoded.created_at.timestamp_micros(),
            cursor.created_at.timestamp_micros()
        );
        assert_eq!(decoded.id, cursor.id);
    }

    #[test]
    fn cursor_rejects_garbage() {
        assert!(Cursor::decode("!!!not-base64!!!").is_err());
        assert!(Cursor::decode(&STANDARD.encode("no-separator")).is_err());
        assert!(Cursor::decode(&STANDARD.encode("123:not-a-uuid")).is_err());
        assert!(Cursor::decode(&STANDARD.encode("xyz:00000000-0000-0000-0000-000000000000")).is_err());
    }
}
