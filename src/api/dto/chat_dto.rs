//! Chat and message DTOs.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::domain::{ChatId, ChatRecord, MessageId, MessageRecord, MessageType, UserId};

/// Request body for `POST /chats`.
#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateChatRequest {
    /// The other participant.
    pub recipient_id: UserId,
}

/// A chat as returned by the REST API.
#[derive(Debug, Serialize, ToSchema)]
pub struct ChatDto {
    /// Chat identifier.
    pub id: ChatId,
    /// User who opened the chat.
    pub initiator_id: UserId,
    /// The other participant.
    pub recipient_id: UserId,
    /// Closed chats reject new messages.
    pub is_active: bool,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
}

impl From<ChatRecord> for ChatDto {
    fn from(chat: ChatRecord) -> Self {
        Self {
            id: chat.id,
            initiator_id: chat.initiator_id,
            recipient_id: chat.recipient_id,
            is_active: chat.is_active,
            created_at: chat.created_at,
        }
    }
}

/// Request body for `POST /chats/{id}/messages`.
#[derive(Debug, Deserialize, ToSchema)]
pub struct SendMessageRequest {
    /// Message text (trimmed, at most 2000 characters by default).
    pub content: String,
    /// Message kind. Defaults to `text`.
    #[serde(default)]
    pub message_type: MessageType,
}

/// A stored message.
#[derive(Debug, Serialize, ToSchema)]
pub struct MessageDto {
    /// Message identifier.
    pub id: MessageId,
    /// Owning chat.
    pub chat: ChatId,
    /// Author.
    pub sender_id: UserId,
    /// Text.
    pub content: String,
    /// Kind.
    pub message_type: MessageType,
    /// Read by the other participant.
    pub is_read: bool,
    /// Write timestamp.
    pub created_at: DateTime<Utc>,
}

impl From<MessageRecord> for MessageDto {
    fn from(message: MessageRecord) -> Self {
        Self {
            id: message.id,
            chat: message.chat_id,
            sender_id: message.sender_id,
            content: message.content,
            message_type: message.message_type,
            is_read: message.is_read,
            created_at: message.created_at,
        }
    }
}
