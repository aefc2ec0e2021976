//! Request extractors shared by REST and websocket handlers.

use axum::extract::{FromRequestParts, Query};
use axum::http::request::Parts;
use serde::Deserialize;

use crate::app_state::AppState;
use crate::auth::{Identity, bearer_token};
use crate::domain::UserId;
use crate::error::RelayError;

/// `?token=` query parameter.
#[derive(Debug, Default, Deserialize)]
pub struct TokenQuery {
    /// Bearer credential passed in the URL.
    pub token: Option<String>,
}

/// The authenticated caller of a request.
///
/// Rejects with `401` when no valid bearer credential is present.
#[derive(Debug, Clone, Copy)]
pub struct AuthUser(pub Identity);

impl AuthUser {
    /// The caller's user id.
    #[must_use]
    pub const fn user_id(&self) -> UserId {
        self.0.user_id
    }
}

impl FromRequestParts<AppState> for AuthUser {
    type Rejection = RelayError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let query = Query::<TokenQuery>::try_from_uri(&parts.uri)
            .map(|Query(q)| q)
            .unwrap_or_default();
        let token = bearer_token(&parts.headers, query.token.as_deref())
            .ok_or_else(|| RelayError::Unauthorized("missing bearer token".to_string()))?;
        let identity = state.authenticator.authenticate(token).await?;
        Ok(Self(identity))
    }
}
