//! Server-to-client frames.
//!
//! [`ServerEvent`] is the closed set of frames a connection can receive.
//! Records are translated into their wire shape here, once per dispatch,
//! and the dispatcher serializes the result into a shared [`Frame`] that
//! is handed to every recipient unchanged.
//!
//! Pushed events carry a per-group `seq` so that a client can detect gaps
//! after a reconnect and fall back to the REST history.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use utoipa::ToSchema;

use super::{
    ChatId, GroupKey, MessageId, MessageRecord, MessageType, NotificationId, NotificationRecord,
    NotificationType, Role, UserId, UserRecord,
};

/// Wire shape of a notification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct NotificationPayload {
    /// Notification identifier.
    pub id: NotificationId,
    /// Short headline.
    pub title: String,
    /// Body text.
    pub content: String,
    /// Category.
    pub notification_type: NotificationType,
    /// Read flag.
    pub is_read: bool,
    /// Highlighted in clients.
    pub is_important: bool,
    /// Client route, if any.
    pub action_url: Option<String>,
    /// Creation timestamp (ISO-8601).
    pub created_at: DateTime<Utc>,
    /// First read timestamp (ISO-8601).
    pub read_at: Option<DateTime<Utc>>,
}

impl From<&NotificationRecord> for NotificationPayload {
    fn from(record: &NotificationRecord) -> Self {
        Self {
            id: record.id,
            title: record.title.clone(),
            content: record.content.clone(),
            notification_type: record.notification_type,
            is_read: record.is_read,
            is_important: record.is_important,
            action_url: record.resolved_action_url(),
            created_at: record.created_at,
            read_at: record.read_at,
        }
    }
}

/// Author summary embedded in a message payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct SenderPayload {
    /// User identifier.
    pub id: UserId,
    /// Display name.
    pub name: String,
    /// Marketplace role.
    pub role: Role,
}

impl From<&UserRecord> for SenderPayload {
    fn from(user: &UserRecord) -> Self {
        Self {
            id: user.id,
            name: user.name.clone(),
            role: user.role,
        }
    }
}

/// Wire shape of a chat message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct MessagePayload {
    /// Message identifier.
    pub id: MessageId,
    /// Owning chat.
    pub chat: ChatId,
    /// Author.
    pub sender: SenderPayload,
    /// Message body.
    pub content: String,
    /// Message kind.
    pub message_type: MessageType,
    /// Read flag.
    pub is_read: bool,
    /// Creation timestamp (ISO-8601).
    pub created_at: DateTime<Utc>,
}

impl MessagePayload {
    /// Builds the payload from a message and its already-loaded author.
    #[must_use]
    pub fn new(message: &MessageRecord, sender: &UserRecord) -> Self {
        Self {
            id: message.id,
            chat: message.chat_id,
            sender: SenderPayload::from(sender),
            content: message.content.clone(),
            message_type: message.message_type,
            is_read: message.is_read,
            created_at: message.created_at,
        }
    }
}

/// Every frame the server sends on a websocket.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerEvent {
    /// First frame after a successful handshake.
    ConnectionEstablished {
        /// Authenticated user.
        user_id: UserId,
        /// Groups the connection joined.
        groups: Vec<GroupKey>,
    },
    /// A notification was persisted for the user.
    NotificationMessage {
        /// The notification.
        notification: NotificationPayload,
    },
    /// A message was persisted in the chat.
    ChatMessage {
        /// The message.
        message: MessagePayload,
    },
    /// Reply to a `mark_read` frame.
    NotificationRead {
        /// The notification after the update.
        notification: NotificationPayload,
    },
    /// Reply to a `ping` frame.
    Pong,
    /// A frame or write failed; the connection stays open.
    Error {
        /// Numeric error code (see [`crate::error::RelayError::error_code`]).
        code: u32,
        /// Human-readable reason.
        message: String,
    },
}

impl ServerEvent {
    /// Push for a freshly persisted notification.
    #[must_use]
    pub fn notification(record: &NotificationRecord) -> Self {
        Self::NotificationMessage {
            notification: NotificationPayload::from(record),
        }
    }

    /// Push for a freshly persisted chat message.
    #[must_use]
    pub fn chat_message(message: &MessageRecord, sender: &UserRecord) -> Self {
        Self::ChatMessage {
            message: MessagePayload::new(message, sender),
        }
    }

    /// Returns the `type` discriminator.
    #[must_use]
    pub const fn event_type_str(&self) -> &'static str {
        match self {
            Self::ConnectionEstablished { .. } => "connection_established",
            Self::NotificationMessage { .. } => "notification_message",
            Self::ChatMessage { .. } => "chat_message",
            Self::NotificationRead { .. } => "notification_read",
            Self::Pong => "pong",
            Self::Error { .. } => "error",
        }
    }

    /// Serializes the event as a standalone reply (no sequence number).
    #[must_use]
    pub fn to_frame(&self) -> Frame {
        Frame::encode(None, self)
    }
}

#[derive(Serialize)]
struct Envelope<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    seq: Option<u64>,
    #[serde(flatten)]
    event: &'a ServerEvent,
}

/// A serialized server frame, cheap to clone across recipients.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame(Arc<str>);

impl Frame {
    /// Serializes `event`, stamping it with `seq` when it is a group push.
    #[must_use]
    pub fn encode(seq: Option<u64>, event: &ServerEvent) -> Self {
        let json = serde_json::to_string(&Envelope { seq, event }).unwrap_or_else(|e| {
            tracing::error!(error = %e, event = event.event_type_str(), "failed to encode frame");
            String::from(r#"{"type":"error","code":3000,"message":"encoding failure"}"#)
        });
        Self(Arc::from(json))
    }

    /// The JSON text.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}
