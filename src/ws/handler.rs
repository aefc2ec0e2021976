//! Axum WebSocket upgrade handlers.
//!
//! Authentication and chat access are checked on the plain HTTP request,
//! so a refused client gets a 401/403/404 response and never reaches the
//! registry.

use axum::extract::ws::WebSocketUpgrade;
use axum::extract::{Path, Query, State};
use axum::http::HeaderMap;
use axum::response::Response;

use super::connection::{ConnectionState, Lifecycle, run_connection};
use super::subscription::Scope;
use crate::api::extract::TokenQuery;
use crate::app_state::AppState;
use crate::auth::{Identity, bearer_token};
use crate::domain::ChatId;
use crate::error::RelayError;

/// `GET /ws/notifications` — Personal notification stream.
///
/// # Errors
///
/// Returns [`RelayError::Unauthorized`] before the upgrade if the token is
/// missing or invalid.
pub async fn notifications_ws(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<TokenQuery>,
    ws: WebSocketUpgrade,
) -> Result<Response, RelayError> {
    let scope = Scope::Personal;
    let mut lifecycle = Lifecycle::new(scope);
    let identity = authenticate(&state, &headers, &query, &mut lifecycle).await?;
    lifecycle.advance(ConnectionState::Authenticated);

    Ok(ws.on_upgrade(move |socket| run_connection(socket, state, identity, scope, lifecycle)))
}

/// `GET /ws/chat/{chat_id}` — Chat room stream (plus personal notifications).
///
/// # Errors
///
/// Before the upgrade: [`RelayError::Unauthorized`] for a bad token,
/// [`RelayError::NotFound`] for an unknown chat, and
/// [`RelayError::Forbidden`] for a non-participant.
pub async fn chat_ws(
    State(state): State<AppState>,
    Path(chat_id): Path<i64>,
    headers: HeaderMap,
    Query(query): Query<TokenQuery>,
    ws: WebSocketUpgrade,
) -> Result<Response, RelayError> {
    let chat_id = ChatId::new(chat_id);
    let scope = Scope::Chat(chat_id);
    let mut lifecycle = Lifecycle::new(scope);
    let identity = authenticate(&state, &headers, &query, &mut lifecycle).await?;

    if let Err(e) = state
        .chat_service
        .chat_for_participant(chat_id, identity.user_id)
        .await
    {
        lifecycle.advance(ConnectionState::Rejected);
        tracing::info!(conn_id = %lifecycle.id(), user_id = %identity.user_id, %chat_id, error = %e, "chat handshake rejected");
        return Err(e);
    }
    lifecycle.advance(ConnectionState::Authenticated);

    Ok(ws.on_upgrade(move |socket| run_connection(socket, state, identity, scope, lifecycle)))
}

async fn authenticate(
    state: &AppState,
    headers: &HeaderMap,
    query: &TokenQuery,
    lifecycle: &mut Lifecycle,
) -> Result<Identity, RelayError> {
    lifecycle.advance(ConnectionState::Authenticating);
    let result = match bearer_token(headers, query.token.as_deref()) {
        Some(token) => state.authenticator.authenticate(token).await,
        None => Err(RelayError::Unauthorized("missing bearer token".to_string())),
    };
    if let Err(e) = &result {
        lifecycle.advance(ConnectionState::Rejected);
        tracing::info!(conn_id = %lifecycle.id(), error = %e, "handshake rejected");
    }
    result
}
