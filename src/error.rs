use axum::response::{IntoResponse, Response};
use thiserror::Error;

use crate::middleware::error_handling;

pub type AppResult<T> = Result<T, AppError>;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("server start failure: {0}")]
    StartServer(String),

    #[error("bad request: {0}")]
    BadRequest(String),

    #[error("unauthorized")]
    Unauthorized,

    #[error("forbidden")]
    Forbidden,

    #[error("conversation not found")]
    NotFound,

    #[error("a conversation requires two distinct participants")]
    InvalidParticipants,

    #[error("sender is not a participant of this conversation")]
    InvalidSender,

    #[error("message body is empty")]
    EmptyBody,

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("internal server error")]
    Internal,
}

impl AppError {
    /// Whether the failure is transient and worth retrying (e.g. pool
    /// timeout). Validation errors are always permanent.
    pub fn is_retryable(&self) -> bool {
        match self {
            AppError::Database(e) => {
                matches!(
                    e,
                    sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed | sqlx::Error::Io(_)
                )
            }
            _ => false,
        }
    }

    pub fn status_code(&self) -> u16 {
        match self {
            AppError::BadRequest(_)
            | AppError::InvalidParticipants
            | AppError::EmptyBody => 400,
            AppError::Unauthorized => 401,
            AppError::Forbidden => 403,
            AppError::NotFound => 404,
            AppError::InvalidSender => 422,
            AppError::Database(_) if self.is_retryable() => 503,
            _ => 500,
        }
    }

    /// Stable machine-readable code, used both in HTTP error bodies and in
    /// realtime `error` events.
    pub fn code(&self) -> &'static str {
        match self {
            AppError::Config(_) | AppError::StartServer(_) => "server_error",
            AppError::BadRequest(_) => "bad_request",
            AppError::Unauthorized => "unauthenticated",
            AppError::Forbidden => "forbidden",
            AppError::NotFound => "not_found",
            AppError::InvalidParticipants => "invalid_participants",
            AppError::InvalidSender => "invalid_sender",
            AppError::EmptyBody => "empty_body",
            AppError::Database(_) => {
                if self.is_retryable() {
                    "transient"
                } else {
                    "database_error"
                }
            }
            AppError::Internal => "internal_error",
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        error_handling::into_response(self).into_response()
    }
}
