use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::postgres::PgRow;
use sqlx::{Pool, Postgres, Row};
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::models::conversation::{Conversation, ParticipantPair};
use crate::services::user_directory::PublicProfile;

/// A conversation as listed for one user: the other participant's public
/// identity plus unread state, ordered by most recent activity.
#[derive(Debug, Clone, Serialize)]
pub struct ConversationSummary {
    pub id: Uuid,
    pub peer: PublicProfile,
    pub last_message_preview: String,
    pub last_message_at: DateTime<Utc>,
    pub unread_count: i64,
    pub active: bool,
    pub created_at: DateTime<Utc>,
}

const CONVERSATION_COLUMNS: &str =
    "id, participant_low, participant_high, last_message_preview, last_message_at, active, created_at";

pub struct ConversationService;

impl ConversationService {
    /// Look up or lazily create the one conversation between two users.
    ///
    /// The normalized pair is the uniqueness key, so `(a, b)` and `(b, a)`
    /// resolve identically, and the `ON CONFLICT DO NOTHING` insert makes
    /// concurrent first contact an upsert rather than a race: whichever
    /// insert loses simply finds the winner's row on the follow-up lookup.
    pub async fn get_or_create(
        db: &Pool<Postgres>,
        user_a: Uuid,
        user_b: Uuid,
    ) -> AppResult<Conversation> {
        let pair = ParticipantPair::new(user_a, user_b)?;

        sqlx::query(
            "INSERT INTO conversations (id, participant_low, participant_high) \
             VALUES ($1, $2, $3) \
             ON CONFLICT (participant_low, participant_high) DO NOTHING",
        )
        .bind(Uuid::new_v4())
        .bind(pair.low())
        .bind(pair.high())
        .execute(db)
        .await?;

        let row = sqlx::query(&format!(
            "SELECT {CONVERSATION_COLUMNS} FROM conversations \
             WHERE participant_low = $1 AND participant_high = $2"
        ))
        .bind(pair.low())
        .bind(pair.high())
        .fetch_one(db)
        .await?;

        Ok(conversation_from_row(&row))
    }

    pub async fn find(db: &Pool<Postgres>, id: Uuid) -> AppResult<Conversation> {
        let row = sqlx::query(&format!(
            "SELECT {CONVERSATION_COLUMNS} FROM conversations WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(db)
        .await?
        .ok_or(AppError::NotFound)?;

        Ok(conversation_from_row(&row))
    }

    /// Soft-disable (or re-enable) a conversation. Conversations are never
    /// deleted.
    pub async fn set_active(db: &Pool<Postgres>, id: Uuid, active: bool) -> AppResult<()> {
        let result = sqlx::query("UPDATE conversations SET active = $2 WHERE id = $1")
            .bind(id)
            .bind(active)
            .execute(db)
            .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound);
        }
        Ok(())
    }

    /// All active conversations the user participates in, enriched with the
    /// peer's directory fields and the user's unread count, most recent
    /// activity first.
    pub async fn list_for_user(
        db: &Pool<Postgres>,
        user_id: Uuid,
    ) -> AppResult<Vec<ConversationSummary>> {
        let rows = sqlx::query(
            r#"
            SELECT c.id,
                   c.last_message_preview,
                   c.last_message_at,
                   c.active,
                   c.created_at,
                   u.id AS peer_id,
                   u.display_name AS peer_display_name,
                   u.email AS peer_email,
                   (
                     SELECT COUNT(*) FROM messages m
                     WHERE m.conversation_id = c.id
                       AND m.sender_id <> $1
                       AND m.read_flag = FALSE
                   ) AS unread_count
            FROM conversations c
            JOIN users u
              ON u.id = CASE WHEN c.participant_low = $1
                             THEN c.participant_high
                             ELSE c.participant_low END
            WHERE (c.participant_low = $1 OR c.participant_high = $1)
              AND c.active
            ORDER BY c.last_message_at DESC
            "#,
        )
        .bind(user_id)
        .fetch_all(db)
        .await?;

        let summaries = rows
            .into_iter()
            .map(|r| ConversationSummary {
                id: r.get("id"),
                peer: PublicProfile {
                    id: r.get("peer_id"),
                    display_name: r.get("peer_display_name"),
                    email: r.get("peer_email"),
                },
                last_message_preview: r.get("last_message_preview"),
                last_message_at: r.get("last_message_at"),
                unread_count: r.get("unread_count"),
                active: r.get("active"),
                created_at: r.get("created_at"),
            })
            .collect();

        Ok(summaries)
    }
}

fn conversation_from_row(row: &PgRow) -> Conversation {
    Conversation {
        id: row.get("id"),
        participants: ParticipantPair::from_stored(
            row.get("participant_low"),
            row.get("participant_high"),
        ),
        last_message_preview: row.get("last_message_preview"),
        last_message_at: row.get("last_message_at"),
        active: row.get("active"),
        created_at: row.get("created_at"),
    }
}
