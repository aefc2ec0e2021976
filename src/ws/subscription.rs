//! Which groups a connection belongs to.
//!
//! Membership is fixed at handshake time by the route the client dialed;
//! there are no runtime subscribe commands.

use std::fmt;

use crate::domain::{ChatId, GroupKey, UserId};

/// The route a connection was opened on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scope {
    /// `/ws/notifications`: personal group only.
    Personal,
    /// `/ws/chat/{chat_id}`: personal group plus the chat room.
    Chat(ChatId),
}

impl Scope {
    /// Groups a connection of `user_id` joins, personal group first.
    #[must_use]
    pub fn groups(self, user_id: UserId) -> Vec<GroupKey> {
        match self {
            Self::Personal => vec![GroupKey::user(user_id)],
            Self::Chat(chat_id) => vec![GroupKey::user(user_id), GroupKey::chat(chat_id)],
        }
    }

    /// The chat this connection may post into, if any.
    #[must_use]
    pub const fn chat(self) -> Option<ChatId> {
        match self {
            Self::Personal => None,
            Self::Chat(chat_id) => Some(chat_id),
        }
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Personal => f.write_str("notifications"),
            Self::Chat(chat_id) => write!(f, "chat/{chat_id}"),
        }
    }
}
