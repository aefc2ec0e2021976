//! Bearer credential validation.
//!
//! Tokens are issued by the identity service as HS256 JWTs carrying a
//! `user_id` claim. The relay only verifies them: signature, expiry, and
//! the presence of a user id. Every websocket handshake and REST request
//! goes through [`Authenticator::authenticate`] exactly once.

use std::fmt;

use async_trait::async_trait;
use axum::http::HeaderMap;
use axum::http::header::AUTHORIZATION;
use jsonwebtoken::{Algorithm, DecodingKey, Validation, decode};
use serde::{Deserialize, Serialize};

use crate::domain::UserId;
use crate::error::RelayError;

/// The authenticated principal behind a connection or request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Identity {
    /// Authenticated user.
    pub user_id: UserId,
}

/// Claims the relay reads from an access token.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// Authenticated user.
    pub user_id: i64,
    /// Expiry (Unix seconds).
    pub exp: i64,
    /// Token type as issued by the identity service (`"access"`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_type: Option<String>,
}

/// Validates bearer credentials.
#[async_trait]
pub trait Authenticator: Send + Sync + fmt::Debug {
    /// Resolves `token` to an identity.
    ///
    /// # Errors
    ///
    /// Returns [`RelayError::Unauthorized`] for any invalid, expired, or
    /// foreign token.
    async fn authenticate(&self, token: &str) -> Result<Identity, RelayError>;
}

/// HS256 JWT verifier.
pub struct JwtAuthenticator {
    key: DecodingKey,
    validation: Validation,
}

impl fmt::Debug for JwtAuthenticator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JwtAuthenticator")
            .field("algorithms", &self.validation.algorithms)
            .field("leeway", &self.validation.leeway)
            .finish_non_exhaustive()
    }
}

impl JwtAuthenticator {
    /// Creates a verifier for tokens signed with `secret`.
    #[must_use]
    pub fn new(secret: &str, leeway_secs: u64) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = leeway_secs;
        validation.set_required_spec_claims(&["exp"]);
        Self {
            key: DecodingKey::from_secret(secret.as_bytes()),
            validation,
        }
    }
}

#[async_trait]
impl Authenticator for JwtAuthenticator {
    async fn authenticate(&self, token: &str) -> Result<Identity, RelayError> {
        let data = decode::<Claims>(token, &self.key, &self.validation)
            .map_err(|e| RelayError::Unauthorized(format!("token rejected: {e}")))?;

        if let Some(kind) = data.claims.token_type.as_deref()
            && kind != "access"
        {
            return Err(RelayError::Unauthorized(format!(
                "expected an access token, got {kind}"
            )));
        }

        Ok(Identity {
            user_id: UserId::new(data.claims.user_id),
        })
    }
}

/// Picks the bearer credential from a handshake or request.
///
/// The `?token=` query parameter wins because browsers cannot set headers
/// on websocket upgrades; otherwise `Authorization: Bearer <token>`.
#[must_use]
pub fn bearer_token<'a>(headers: &'a HeaderMap, query_token: Option<&'a str>) -> Option<&'a str> {
    if let Some(token) = query_token.map(str::trim).filter(|t| !t.is_empty()) {
        return Some(token);
    }
    headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty())
}

/// Issues a token for `user_id` valid for `ttl`. Used by tests and local
/// tooling; production tokens come from the identity service.
///
/// # Errors
///
/// Returns [`RelayError::Internal`] if encoding fails.
pub fn issue_token(secret: &str, user_id: UserId, ttl: chrono::Duration) -> Result<String, RelayError> {
    let claims = Claims {
        user_id: user_id.get(),
        exp: (chrono::Utc::now() + ttl).timestamp(),
        token_type: Some("access".to_string()),
    };
    jsonwebtoken::encode(
        &jsonwebtoken::Header::new(Algorithm::HS256),
        &claims,
        &jsonwebtoken::EncodingKey::from_secret(secret.as_bytes()),
    )
    .map_err(|e| RelayError::Internal(format!("token encoding failed: {e}")))
}
