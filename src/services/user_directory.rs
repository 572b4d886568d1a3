use serde::Serialize;
use sqlx::{Pool, Postgres, Row};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::error::AppResult;

/// Public directory fields of a user, as exposed in conversation summaries.
///
/// The users table is owned by the identity subsystem; this service only
/// ever reads it.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct PublicProfile {
    pub id: Uuid,
    pub display_name: String,
    pub email: String,
}

pub struct UserDirectory;

impl UserDirectory {
    pub async fn find(db: &Pool<Postgres>, id: Uuid) -> AppResult<Option<PublicProfile>> {
        let row = sqlx::query("SELECT id, display_name, email FROM users WHERE id = $1")
            .bind(id)
            .fetch_optional(db)
            .await?;

        Ok(row.map(|r| PublicProfile {
            id: r.get("id"),
            display_name: r.get("display_name"),
            email: r.get("email"),
        }))
    }
}
