use async_trait::async_trait;
use axum::extract::{Request, State};
use axum::http::HeaderMap;
use axum::middleware::Next;
use axum::response::Response;

use crate::error::AppError;
use crate::state::AppState;

pub use identity_core::VerifiedIdentity;

/// Resolves a bearer credential to a verified identity.
///
/// The production implementation validates RS256 JWTs through
/// identity-core; tests substitute stubs so no key material is needed.
#[async_trait]
pub trait IdentityVerifier: Send + Sync {
    async fn verify(&self, credential: &str) -> Result<VerifiedIdentity, AppError>;
}

pub struct JwtVerifier;

#[async_trait]
impl IdentityVerifier for JwtVerifier {
    async fn verify(&self, credential: &str) -> Result<VerifiedIdentity, AppError> {
        identity_core::verify_credential(credential).map_err(|_| AppError::Unauthorized)
    }
}

pub fn bearer_token(headers: &HeaderMap) -> Option<String> {
    headers
        .get(axum::http::header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.strip_prefix("Bearer "))
        .map(|s| s.to_string())
}

/// Require a valid bearer credential and stash the verified identity in
/// request extensions for the `User` extractor.
pub async fn auth_middleware(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, AppError> {
    let token = bearer_token(req.headers()).ok_or(AppError::Unauthorized)?;
    let identity = state.verifier.verify(&token).await?;

    req.extensions_mut().insert(identity);

    Ok(next.run(req).await)
}
