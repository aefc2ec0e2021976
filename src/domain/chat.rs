//! Chats and their ordered messages.

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::{ChatId, MessageId, Role, UserId, UserRecord};
use crate::error::RelayError;

/// A two-party conversation between a client and a plumber.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChatRecord {
    /// Chat identifier.
    pub id: ChatId,
    /// User who opened the chat.
    pub initiator_id: UserId,
    /// The other participant.
    pub recipient_id: UserId,
    /// Inactive chats keep their history but reject new messages.
    pub is_active: bool,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
}

impl ChatRecord {
    /// Returns `true` if `user_id` is one of the two participants.
    #[must_use]
    pub fn is_participant(&self, user_id: UserId) -> bool {
        self.initiator_id == user_id || self.recipient_id == user_id
    }

    /// Returns the participant that is not `user_id`, or `None` if
    /// `user_id` is not a participant.
    #[must_use]
    pub fn counterpart(&self, user_id: UserId) -> Option<UserId> {
        if self.initiator_id == user_id {
            Some(self.recipient_id)
        } else if self.recipient_id == user_id {
            Some(self.initiator_id)
        } else {
            None
        }
    }
}

/// Checks that two users may share a chat: one client and one plumber.
///
/// # Errors
///
/// Returns [`RelayError::InvalidRequest`] when both users are the same
/// person, share a role, or either is not a marketplace party.
pub fn validate_participants(a: &UserRecord, b: &UserRecord) -> Result<(), RelayError> {
    if a.id == b.id {
        return Err(RelayError::InvalidRequest(
            "cannot open a chat with yourself".to_string(),
        ));
    }
    if !a.role.is_marketplace_party() || !b.role.is_marketplace_party() {
        return Err(RelayError::InvalidRequest(
            "chats are limited to clients and plumbers".to_string(),
        ));
    }
    if a.role == b.role {
        return Err(RelayError::InvalidRequest(format!(
            "both participants are {}; a chat needs one client and one plumber",
            a.role
        )));
    }
    debug_assert!(matches!(
        (a.role, b.role),
        (Role::Client, Role::Plumber) | (Role::Plumber, Role::Client)
    ));
    Ok(())
}

/// Kind of chat message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum MessageType {
    /// Plain text.
    #[default]
    Text,
    /// Image attachment with optional caption.
    Image,
    /// Generated by the platform (e.g. review links).
    System,
}

impl MessageType {
    /// Returns the type as stored in the database.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::Image => "image",
            Self::System => "system",
        }
    }
}

impl fmt::Display for MessageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MessageType {
    type Err = RelayError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "text" => Ok(Self::Text),
            "image" => Ok(Self::Image),
            "system" => Ok(Self::System),
            other => Err(RelayError::Persistence(format!(
                "unknown message type: {other}"
            ))),
        }
    }
}

/// A persisted chat message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MessageRecord {
    /// Message identifier.
    pub id: MessageId,
    /// Owning chat.
    pub chat_id: ChatId,
    /// Author; always a participant of `chat_id`.
    pub sender_id: UserId,
    /// Message body.
    pub content: String,
    /// Message kind.
    pub message_type: MessageType,
    /// Whether the counterpart has read it.
    pub is_read: bool,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
}

impl MessageRecord {
    /// Total order of messages within a chat: creation time, then id.
    #[must_use]
    pub fn chronological(a: &Self, b: &Self) -> Ordering {
        a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id))
    }
}

/// A message about to be written, before it has an id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewMessage {
    /// Owning chat.
    pub chat_id: ChatId,
    /// Authenticated author.
    pub sender_id: UserId,
    /// Trimmed body.
    pub content: String,
    /// Message kind.
    pub message_type: MessageType,
}

impl NewMessage {
    /// Builds a message draft, trimming and length-checking `content`.
    ///
    /// # Errors
    ///
    /// Returns [`RelayError::InvalidRequest`] if the trimmed content is
    /// empty or longer than `max_len` characters.
    pub fn new(
        chat_id: ChatId,
        sender_id: UserId,
        content: &str,
        message_type: MessageType,
        max_len: usize,
    ) -> Result<Self, RelayError> {
        let content = content.trim();
        if content.is_empty() {
            return Err(RelayError::InvalidRequest(
                "message content is required".to_string(),
            ));
        }
        let len = content.chars().count();
        if len > max_len {
            return Err(RelayError::InvalidRequest(format!(
                "message is too long ({len} characters, max {max_len})"
            )));
        }
        Ok(Self {
            chat_id,
            sender_id,
            content: content.to_string(),
            message_type,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chat() -> ChatRecord {
        ChatRecord {
            id: ChatId::new(42),
            initiator_id: UserId::new(1),
            recipient_id: UserId::new(2),
            is_active: true,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn participants_and_counterparts() {
        let chat = chat();
        assert!(chat.is_participant(UserId::new(1)));
        assert!(chat.is_participant(UserId::new(2)));
        assert!(!chat.is_participant(UserId::new(3)));
        assert_eq!(chat.counterpart(UserId::new(1)), Some(UserId::new(2)));
        assert_eq!(chat.counterpart(UserId::new(3)), None);
    }

    #[test]
    fn client_and_plumber_may_chat() {
        let client = UserRecord::new(UserId::new(1), "A", Role::Client);
        let plumber = UserRecord::new(UserId::new(2), "B", Role::Plumber);
        assert!(validate_participants(&client, &plumber).is_ok());
        assert!(validate_participants(&plumber, &client).is_ok());
    }

    #[test]
    fn same_role_or_staff_cannot_chat() {
        let a = UserRecord::new(UserId::new(1), "A", Role::Client);
        let b = UserRecord::new(UserId::new(2), "B", Role::Client);
        let admin = UserRecord::new(UserId::new(3), "C", Role::Admin);
        assert!(validate_participants(&a, &b).is_err());
        assert!(validate_participants(&a, &admin).is_err());
        assert!(validate_participants(&a, &a).is_err());
    }

    #[test]
    fn new_message_trims_and_limits() {
        let ok = NewMessage::new(ChatId::new(1), UserId::new(1), "  hi  ", MessageType::Text, 10);
        assert_eq!(ok.map(|m| m.content).ok().as_deref(), Some("hi"));

        assert!(NewMessage::new(ChatId::new(1), UserId::new(1), "   ", MessageType::Text, 10).is_err());
        assert!(
            NewMessage::new(ChatId::new(1), UserId::new(1), "12345678901", MessageType::Text, 10)
                .is_err()
        );
    }

    #[test]
    fn chronological_breaks_ties_by_id() {
        let at = Utc::now();
        let make = |id| MessageRecord {
            id: MessageId::new(id),
            chat_id: ChatId::new(1),
            sender_id: UserId::new(1),
            content: String::new(),
            message_type: MessageType::Text,
            is_read: false,
            created_at: at,
        };
        let mut msgs = vec![make(3), make(1), make(2)];
        msgs.sort_by(MessageRecord::chronological);
        let ids: Vec<i64> = msgs.iter().map(|m| m.id.get()).collect();
        assert_eq!(ids, vec![1, 2, 3]);
    }
}
