use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::middleware::guards::{ConversationAccess, User};
use crate::models::message::{Message, MessageKind};
use crate::services::chat_service::ChatService;
use crate::services::message_service::{Cursor, MessageService};
use crate::state::AppState;

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct MessageDto {
    pub id: Uuid,
    pub conversation_id: Uuid,
    pub sender_id: Uuid,
    pub kind: MessageKind,
    pub body: String,
    pub read_flag: bool,
    pub read_at: Option<String>,
    pub created_at: String,
}

impl From<&Message> for MessageDto {
    fn from(message: &Message) -> Self {
        Self {
            id: message.id,
            conversation_id: message.conversation_id,
            sender_id: message.sender_id,
            kind: message.kind,
            body: message.body.clone(),
            read_at: message.read_at.map(|t| t.to_rfc3339()),
            read_flag: message.read_flag,
            created_at: message.created_at.to_rfc3339(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct HistoryParams {
    pub limit: Option<i64>,
    pub cursor: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct HistoryResponse {
    pub messages: Vec<MessageDto>,
    /// Present when the page was full; pass back to resume.
    pub next_cursor: Option<String>,
}

pub async fn get_message_history(
    State(state): State<AppState>,
    user: User,
    Path(conversation_id): Path<Uuid>,
    Query(params): Query<HistoryParams>,
) -> Result<Json<HistoryResponse>, crate::error::AppError> {
    ConversationAccess::verify(&state.db, user.id, conversation_id).await?;

    let cursor = params.cursor.as_deref().map(Cursor::decode).transpose()?;
    let limit = params.limit.unwrap_or(state.config.history_page_size);

    let page = MessageService::history(&state.db, conversation_id, limit, cursor).await?;

    Ok(Json(HistoryResponse {
        messages: page.messages.iter().map(MessageDto::from).collect(),
        next_cursor: page.next_cursor.map(|c| c.encode()),
    }))
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct SendMessageRequest {
    pub body: String,
    #[serde(default)]
    pub kind: MessageKind,
}

/// REST counterpart of the gateway's send-message event; same validation,
/// same persist-then-broadcast path.
pub async fn send_message(
    State(state): State<AppState>,
    user: User,
    Path(conversation_id): Path<Uuid>,
    Json(body): Json<SendMessageRequest>,
) -> Result<(StatusCode, Json<MessageDto>), crate::error::AppError> {
    let message = ChatService::send(
        &state.db,
        state.rooms.as_ref(),
        conversation_id,
        user.id,
        &body.body,
        body.kind,
    )
    .await?;

    Ok((StatusCode::CREATED, Json(MessageDto::from(&message))))
}
