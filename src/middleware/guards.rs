//! Authorization guards that enforce permission checks at the type level:
//! a handler that takes one of these cannot accidentally skip the check.

use axum::{async_trait, extract::FromRequestParts, http::request::Parts};
use sqlx::PgPool;
use uuid::Uuid;

use crate::error::AppError;
use crate::middleware::auth::VerifiedIdentity;
use crate::models::conversation::Conversation;
use crate::services::conversation_service::ConversationService;

/// The authenticated user, extracted from the identity placed in request
/// extensions by the auth middleware.
#[derive(Debug, Clone)]
pub struct User {
    pub id: Uuid,
    pub display_name: String,
    pub email: String,
}

#[async_trait]
impl<S> FromRequestParts<S> for User
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let identity = parts
            .extensions
            .get::<VerifiedIdentity>()
            .cloned()
            .ok_or(AppError::Unauthorized)?;

        Ok(User {
            id: identity.user_id,
            display_name: identity.display_name,
            email: identity.email,
        })
    }
}

/// Proof that a user may access a conversation: the conversation exists and
/// the user is one of its two participants.
#[derive(Debug, Clone)]
pub struct ConversationAccess {
    pub conversation: Conversation,
}

impl ConversationAccess {
    pub async fn verify(
        db: &PgPool,
        user_id: Uuid,
        conversation_id: Uuid,
    ) -> Result<Self, AppError> {
        let conversation = ConversationService::find(db, conversation_id).await?;
        if !conversation.participants.contains(user_id) {
            return Err(AppError::Forbidden);
        }
        Ok(Self { conversation })
    }
}
