//! Bearer-token authentication.
//!
//! Tokens are HS256 JWTs whose subject is the numeric user id. A token only yields an
//! [`Actor`] once the user has been loaded from storage and the role claim agrees with
//! the stored role.

use std::sync::Arc;

use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{header::AUTHORIZATION, request::Parts},
};
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use shared::{
    domain::{Actor, Role, UserId},
    error::{ApiError, ErrorCode},
};
use tracing::{debug, warn};

use crate::{
    app_state::AppState,
    error::{into_http, HttpError},
};

#[derive(Debug, Clone)]
pub struct AuthConfig {
    pub secret: String,
    pub ttl_seconds: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub role: Role,
    pub exp: i64,
    pub iat: i64,
}

#[derive(Debug, thiserror::Error)]
pub enum TokenError {
    #[error("token lifetime of {0} seconds is out of range")]
    Lifetime(i64),
    #[error(transparent)]
    Jwt(#[from] jsonwebtoken::errors::Error),
}

pub fn mint_token(cfg: &AuthConfig, actor: &Actor) -> Result<String, TokenError> {
    let now = Utc::now();
    let exp = Duration::try_seconds(cfg.ttl_seconds)
        .and_then(|lifetime| now.checked_add_signed(lifetime))
        .ok_or(TokenError::Lifetime(cfg.ttl_seconds))?;
    let claims = Claims {
        sub: actor.id.to_string(),
        role: actor.role,
        iat: now.timestamp(),
        exp: exp.timestamp(),
    };

    Ok(encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(cfg.secret.as_bytes()),
    )?)
}

pub fn decode_token(cfg: &AuthConfig, token: &str) -> Result<Claims, jsonwebtoken::errors::Error> {
    let validation = Validation::new(Algorithm::HS256);
    decode::<Claims>(
        token,
        &DecodingKey::from_secret(cfg.secret.as_bytes()),
        &validation,
    )
    .map(|data| data.claims)
}

/// Resolves a bearer token to the stored [`Actor`] it names.
pub async fn authenticate(state: &AppState, token: &str) -> Result<Actor, ApiError> {
    let claims = decode_token(&state.auth, token).map_err(|error| {
        debug!(%error, "rejected bearer token");
        unauthenticated("invalid or expired token")
    })?;
    let user_id = claims
        .sub
        .trim()
        .parse::<i64>()
        .map(UserId)
        .map_err(|_| unauthenticated("token subject is not a user id"))?;

    let actor = state
        .api
        .storage
        .actor_by_id(user_id)
        .await
        .map_err(|error| {
            tracing::error!(%error, %user_id, "failed to load token subject");
            ApiError::new(ErrorCode::Internal, error.to_string())
        })?
        .ok_or_else(|| unauthenticated("unknown user"))?;

    if actor.role != claims.role {
        warn!(%user_id, claimed = %claims.role, stored = %actor.role, "token role mismatch");
        return Err(unauthenticated("token role does not match account"));
    }
    Ok(actor)
}

fn unauthenticated(message: &str) -> ApiError {
    ApiError::new(ErrorCode::Unauthenticated, message)
}

fn bearer_token(parts: &Parts) -> Option<&str> {
    let value = parts.headers.get(AUTHORIZATION)?.to_str().ok()?;
    let (scheme, token) = value.split_once(' ')?;
    let token = token.trim();
    (scheme.eq_ignore_ascii_case("bearer") && !token.is_empty()).then_some(token)
}

/// Extractor for handlers that need the calling [`Actor`].
pub struct CurrentActor(pub Actor);

#[async_trait]
impl FromRequestParts<Arc<AppState>> for CurrentActor {
    type Rejection = HttpError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let token = bearer_token(parts)
            .ok_or_else(|| into_http(unauthenticated("missing bearer token")))?;
        authenticate(state, token)
            .await
            .map(CurrentActor)
            .map_err(into_http)
    }
}

#[cfg(test)]
#[path = "tests/auth_tests.rs"]
mod tests;
