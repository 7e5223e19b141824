//! Bearer JWT authentication.
//!
//! Tokens are HS256 with the user id in `sub` and an `admin` flag;
//! WebSocket connections pass the same token as a query parameter since
//! browsers cannot set headers on upgrade requests.

use axum::http::header::AUTHORIZATION;
use axum::http::HeaderMap;
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use binopt_core::config::AuthConfig;

use crate::error::ApiError;

#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub admin: bool,
    pub exp: i64,
}

#[derive(Debug, Clone, Copy)]
pub struct AuthUser {
    pub user_id: Uuid,
    pub is_admin: bool,
}

fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
}

/// Validates a raw token string.
///
/// # Errors
/// Returns 401 when the token is missing, expired, or malformed.
pub fn authenticate_token(config: &AuthConfig, token: &str) -> Result<AuthUser, ApiError> {
    let mut validation = Validation::new(Algorithm::HS256);
    validation.validate_exp = true;

    let decoded = decode::<Claims>(
        token,
        &DecodingKey::from_secret(config.jwt_secret.as_bytes()),
        &validation,
    )
    .map_err(|_| ApiError::unauthorized("invalid token"))?;

    let user_id = decoded
        .claims
        .sub
        .parse::<Uuid>()
        .map_err(|_| ApiError::unauthorized("invalid token"))?;

    Ok(AuthUser {
        user_id,
        is_admin: decoded.claims.admin,
    })
}

/// Authenticates the request's bearer token.
///
/// # Errors
/// Returns 401 when the Authorization header is missing or invalid.
pub fn authenticate(config: &AuthConfig, headers: &HeaderMap) -> Result<AuthUser, ApiError> {
    let token = bearer_token(headers).ok_or_else(|| ApiError::unauthorized("not authenticated"))?;
    authenticate_token(config, token)
}

/// Authenticates and requires the admin flag.
///
/// # Errors
/// Returns 401 on bad credentials, 403 for non-admin users.
pub fn require_admin(config: &AuthConfig, headers: &HeaderMap) -> Result<AuthUser, ApiError> {
    let user = authenticate(config, headers)?;
    if !user.is_admin {
        return Err(ApiError::forbidden("admin only"));
    }
    Ok(user)
}

/// Issues a token for a user.
///
/// # Errors
/// Returns an error if signing fails.
pub fn issue_token(config: &AuthConfig, user_id: Uuid, admin: bool) -> anyhow::Result<String> {
    let exp = (Utc::now() + Duration::minutes(config.token_expiry_minutes)).timestamp();
    let claims = Claims {
        sub: user_id.to_string(),
        admin,
        exp,
    };
    Ok(encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(config.jwt_secret.as_bytes()),
    )?)
}
