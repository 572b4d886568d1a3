use axum::{http::StatusCode, response::IntoResponse, Json};
use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::error::AppError;

/// Uniform error body returned by every route.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
    pub status: u16,
    pub code: String,
    pub timestamp: String,
}

pub fn map_error(err: &AppError) -> (StatusCode, ErrorResponse) {
    let status =
        StatusCode::from_u16(err.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);

    let response = ErrorResponse {
        error: status.canonical_reason().unwrap_or("Error").to_string(),
        message: err.to_string(),
        status: status.as_u16(),
        code: err.code().to_string(),
        timestamp: Utc::now().to_rfc3339(),
    };

    (status, response)
}

pub fn into_response(err: AppError) -> impl IntoResponse {
    let (status, response) = map_error(&err);
    (status, Json(response))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn maps_validation_errors_to_400() {
        for err in [AppError::InvalidParticipants, AppError::EmptyBody] {
            let (status, body) = map_error(&err);
            assert_eq!(status.as_u16(), 400, "{err}");
            assert_eq!(body.status, 400);
        }
    }

    #[test]
    fn maps_unauthorized_to_401_with_code() {
        let (status, body) = map_error(&AppError::Unauthorized);
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body.code, "unauthenticated");
    }

    #[test]
    fn maps_not_found_and_invalid_sender() {
        let (status, _) = map_error(&AppError::NotFound);
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (status, body) = map_error(&AppError::InvalidSender);
        assert_eq!(status.as_u16(), 422);
        assert_eq!(body.code, "invalid_sender");
    }

    #[test]
    fn maps_transient_database_errors_to_503() {
        let (status, body) = map_error(&AppError::Database(sqlx::Error::PoolTimedOut));
        assert_eq!(status.as_u16(), 503);
        assert_eq!(body.code, "transient");
    }
}
