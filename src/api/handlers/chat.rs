//! Chat handlers: open a chat, send a message, read history.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};

use crate::api::dto::{ChatDto, CreateChatRequest, MessageDto, SendMessageRequest};
use crate::api::extract::AuthUser;
use crate::app_state::AppState;
use crate::domain::ChatId;
use crate::error::{ErrorResponse, RelayError};

/// `POST /chats` — Open a chat with another user.
///
/// # Errors
///
/// Returns [`RelayError::InvalidRequest`] unless the pair is one client and
/// one plumber.
#[utoipa::path(
    post,
    path = "/api/v1/chats",
    tag = "Chats",
    summary = "Open a chat",
    description = "Opens a chat between the caller and `recipient_id`. If the two already share a chat it is returned with 200 instead of 201.",
    request_body = CreateChatRequest,
    responses(
        (status = 201, description = "Chat created", body = ChatDto),
        (status = 200, description = "Existing chat", body = ChatDto),
        (status = 400, description = "Roles do not allow a chat", body = ErrorResponse),
        (status = 401, description = "Missing or invalid token", body = ErrorResponse),
        (status = 404, description = "Unknown user", body = ErrorResponse),
    )
)]
pub async fn create_chat(
    State(state): State<AppState>,
    caller: AuthUser,
    Json(req): Json<CreateChatRequest>,
) -> Result<impl IntoResponse, RelayError> {
    let (chat, created) = state
        .chat_service
        .create_chat(caller.user_id(), req.recipient_id)
        .await?;
    let status = if created {
        StatusCode::CREATED
    } else {
        StatusCode::OK
    };
    Ok((status, Json(ChatDto::from(chat))))
}

/// `GET /chats/{id}/messages` — Ordered history of a chat.
///
/// # Errors
///
/// Returns [`RelayError::Forbidden`] for non-participants.
#[utoipa::path(
    get,
    path = "/api/v1/chats/{id}/messages",
    tag = "Chats",
    summary = "Chat history",
    params(
        ("id" = i64, Path, description = "Chat id"),
    ),
    responses(
        (status = 200, description = "Messages, oldest first", body = Vec<MessageDto>),
        (status = 401, description = "Missing or invalid token", body = ErrorResponse),
        (status = 403, description = "Not a participant", body = ErrorResponse),
        (status = 404, description = "No such chat", body = ErrorResponse),
    )
)]
pub async fn list_messages(
    State(state): State<AppState>,
    caller: AuthUser,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, RelayError> {
    let messages = state
        .chat_service
        .history(ChatId::new(id), caller.user_id())
        .await?;
    Ok(Json(
        messages.into_iter().map(MessageDto::from).collect::<Vec<_>>(),
    ))
}

/// `POST /chats/{id}/messages` — Send a message.
///
/// The message is stored, then pushed to everyone connected to the chat
/// before this response is written.
///
/// # Errors
///
/// Returns [`RelayError`] on access, validation, or storage failure.
#[utoipa::path(
    post,
    path = "/api/v1/chats/{id}/messages",
    tag = "Chats",
    summary = "Send a message",
    params(
        ("id" = i64, Path, description = "Chat id"),
    ),
    request_body = SendMessageRequest,
    responses(
        (status = 201, description = "Message stored and relayed", body = MessageDto),
        (status = 400, description = "Empty, too long, or chat closed", body = ErrorResponse),
        (status = 401, description = "Missing or invalid token", body = ErrorResponse),
        (status = 403, description = "Not a participant", body = ErrorResponse),
        (status = 404, description = "No such chat", body = ErrorResponse),
        (status = 503, description = "Storage unavailable", body = ErrorResponse),
    )
)]
pub async fn send_message(
    State(state): State<AppState>,
    caller: AuthUser,
    Path(id): Path<i64>,
    Json(req): Json<SendMessageRequest>,
) -> Result<impl IntoResponse, RelayError> {
    let message = state
        .chat_service
        .send_message(ChatId::new(id), caller.user_id(), &req.content, req.message_type)
        .await?;
    Ok((StatusCode::CREATED, Json(MessageDto::from(message))))
}

/// Chat routes, mounted under `/api/v1`.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/chats", post(create_chat))
        .route("/chats/{id}/messages", get(list_messages).post(send_message))
}
