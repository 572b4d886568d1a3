//! Shared identity verification for Worklink services.
//!
//! Every Worklink backend resolves a bearer credential to a verified user
//! identity through this library. Tokens are JWTs signed with RS256 (RSA
//! with SHA-256); symmetric algorithms are rejected outright to rule out
//! algorithm-confusion attacks.
//!
//! Services that only consume identities (the chat service, dashboards)
//! call [`initialize_validation_only`] at startup with the public key and
//! never see the private key. Only the identity service itself initializes
//! signing material with [`initialize_signing_keys`].

use anyhow::{anyhow, Result};
use chrono::{Duration, Utc};
use jsonwebtoken::{
    decode, encode, Algorithm, DecodingKey, EncodingKey, Header, TokenData, Validation,
};
use once_cell::sync::OnceCell;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

const ACCESS_TOKEN_EXPIRY_HOURS: i64 = 1;

/// The only accepted algorithm. Never widened.
const JWT_ALGORITHM: Algorithm = Algorithm::RS256;

/// JWT claims carried by Worklink access tokens.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Claims {
    /// Subject (user ID as UUID string)
    pub sub: String,
    /// Issued at (Unix timestamp)
    pub iat: i64,
    /// Expiration time (Unix timestamp)
    pub exp: i64,
    /// Token type: "access" or "refresh"
    pub token_type: String,
    /// Email address
    pub email: String,
    /// Public display name
    pub display_name: String,
}

/// A credential resolved to a verified user identity.
///
/// This is the contract every service consumes: an opaque bearer token in,
/// a user id plus the public directory fields out.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifiedIdentity {
    pub user_id: Uuid,
    pub display_name: String,
    pub email: String,
}

// Keys are loaded once at startup and immutable thereafter. OnceCell gives
// thread-safe initialization without runtime locks.
static JWT_ENCODING_KEY: OnceCell<EncodingKey> = OnceCell::new();
static JWT_DECODING_KEY: OnceCell<DecodingKey> = OnceCell::new();

/// Initialize both signing and validation keys from PEM material.
///
/// Must be called during startup, before any token operation, and only by
/// services that mint tokens. Can only succeed once per process.
pub fn initialize_signing_keys(private_key_pem: &str, public_key_pem: &str) -> Result<()> {
    let encoding_key = EncodingKey::from_rsa_pem(private_key_pem.as_bytes())
        .map_err(|e| anyhow!("failed to parse RSA private key: {e}"))?;
    let decoding_key = DecodingKey::from_rsa_pem(public_key_pem.as_bytes())
        .map_err(|e| anyhow!("failed to parse RSA public key: {e}"))?;

    JWT_ENCODING_KEY
        .set(encoding_key)
        .map_err(|_| anyhow!("JWT encoding key already initialized"))?;
    JWT_DECODING_KEY
        .set(decoding_key)
        .map_err(|_| anyhow!("JWT decoding key already initialized"))?;

    Ok(())
}

/// Initialize the validation key only.
///
/// The right choice for services that never generate tokens: the private
/// key never reaches their environment.
pub fn initialize_validation_only(public_key_pem: &str) -> Result<()> {
    let decoding_key = DecodingKey::from_rsa_pem(public_key_pem.as_bytes())
        .map_err(|e| anyhow!("failed to parse RSA public key: {e}"))?;

    JWT_DECODING_KEY
        .set(decoding_key)
        .map_err(|_| anyhow!("JWT decoding key already initialized"))?;

    Ok(())
}

fn get_encoding_key() -> Result<&'static EncodingKey> {
    JWT_ENCODING_KEY
        .get()
        .ok_or_else(|| anyhow!("JWT keys not initialized; call initialize_signing_keys() during startup"))
}

fn get_decoding_key() -> Result<&'static DecodingKey> {
    JWT_DECODING_KEY.get().ok_or_else(|| {
        anyhow!("JWT keys not initialized; call initialize_signing_keys() or initialize_validation_only() during startup")
    })
}

/// Generate a short-lived access token for a user.
pub fn generate_access_token(user_id: Uuid, email: &str, display_name: &str) -> Result<String> {
    let now = Utc::now();
    let expiry = now + Duration::hours(ACCESS_TOKEN_EXPIRY_HOURS);

    let claims = Claims {
        sub: user_id.to_string(),
        iat: now.timestamp(),
        exp: expiry.timestamp(),
        token_type: "access".to_string(),
        email: email.to_string(),
        display_name: display_name.to_string(),
    };

    let encoding_key = get_encoding_key()?;
    encode(&Header::new(JWT_ALGORITHM), &claims, encoding_key)
        .map_err(|e| anyhow!("failed to generate access token: {e}"))
}

/// Validate a token's signature, expiry and structure, returning the claims.
///
/// No fallback to weaker algorithms: a token signed with anything other
/// than RS256 fails here regardless of its header.
pub fn validate_token(token: &str) -> Result<TokenData<Claims>> {
    let decoding_key = get_decoding_key()?;

    let mut validation = Validation::new(JWT_ALGORITHM);
    validation.validate_exp = true;

    decode::<Claims>(token, decoding_key, &validation)
        .map_err(|e| anyhow!("token validation failed: {e}"))
}

/// Resolve a bearer credential to a [`VerifiedIdentity`].
///
/// Validates first; never trust identity fields from an unvalidated token.
pub fn verify_credential(token: &str) -> Result<VerifiedIdentity> {
    let token_data = validate_token(token)?;
    let user_id = Uuid::parse_str(&token_data.claims.sub)
        .map_err(|e| anyhow!("invalid user ID format in token: {e}"))?;

    Ok(VerifiedIdentity {
        user_id,
        display_name: token_data.claims.display_name,
        email: token_data.claims.email,
    })
}
