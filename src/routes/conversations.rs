use axum::{
    extract::{Path, State},
    Json,
};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::error::AppError;
use crate::middleware::guards::{ConversationAccess, User};
use crate::services::chat_service::ChatService;
use crate::services::conversation_service::{ConversationService, ConversationSummary};
use crate::services::message_service::MessageService;
use crate::services::user_directory::{PublicProfile, UserDirectory};
use crate::state::AppState;

#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateConversationRequest {
    pub peer_id: Uuid,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ConversationSummaryDto {
    pub id: Uuid,
    pub peer: PublicProfile,
    pub last_message_preview: String,
    pub last_message_at: String,
    pub unread_count: i64,
    pub active: bool,
    pub created_at: String,
}

impl From<&ConversationSummary> for ConversationSummaryDto {
    fn from(summary: &ConversationSummary) -> Self {
        Self {
            id: summary.id,
            peer: summary.peer.clone(),
            last_message_preview: summary.last_message_preview.clone(),
            last_message_at: summary.last_message_at.to_rfc3339(),
            unread_count: summary.unread_count,
            active: summary.active,
            created_at: summary.created_at.to_rfc3339(),
        }
    }
}

/// Get or create the conversation between the authenticated user and a
/// peer. Idempotent: repeated calls (from either side) return the same
/// conversation.
pub async fn create_conversation(
    State(state): State<AppState>,
    user: User,
    Json(body): Json<CreateConversationRequest>,
) -> Result<Json<ConversationSummaryDto>, AppError> {
    let peer = UserDirectory::find(&state.db, body.peer_id)
        .await?
        .ok_or_else(|| AppError::BadRequest("peer user does not exist".into()))?;

    let conversation = ConversationService::get_or_create(&state.db, user.id, body.peer_id).await?;
    let unread_count = MessageService::unread_count(&state.db, conversation.id, user.id).await?;

    Ok(Json(ConversationSummaryDto {
        id: conversation.id,
        peer,
        last_message_preview: conversation.last_message_preview,
        last_message_at: conversation.last_message_at.to_rfc3339(),
        unread_count,
        active: conversation.active,
        created_at: conversation.created_at.to_rfc3339(),
    }))
}

pub async fn list_conversations(
    State(state): State<AppState>,
    user: User,
) -> Result<Json<Vec<ConversationSummaryDto>>, AppError> {
    let summaries = ChatService::list_conversations(&state.db, user.id).await?;
    Ok(Json(summaries.iter().map(ConversationSummaryDto::from).collect()))
}

#[derive(Debug, Serialize, ToSchema)]
pub struct MarkReadResponse {
    pub updated: u64,
}

pub async fn mark_as_read(
    State(state): State<AppState>,
    user: User,
    Path(conversation_id): Path<Uuid>,
) -> Result<Json<MarkReadResponse>, AppError> {
    ConversationAccess::verify(&state.db, user.id, conversation_id).await?;

    let updated = ChatService::mark_conversation_read(
        &state.db,
        state.rooms.as_ref(),
        conversation_id,
        user.id,
    )
    .await?;

    Ok(Json(MarkReadResponse { updated }))
}
