//! Group addressing scheme.
//!
//! A [`GroupKey`] names a broadcast set of live connections. Write paths
//! address pushes exclusively through these keys:
//!
//! | Key              | Members                                      |
//! |------------------|----------------------------------------------|
//! | `user_{user_id}` | every live connection of that user           |
//! | `chat_{chat_id}` | every live chat-scoped connection of the chat |

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use super::{ChatId, UserId};
use crate::error::RelayError;

/// Name of a broadcast group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GroupKey {
    /// Personal notification group of one user.
    User(UserId),
    /// Message relay group of one chat.
    Chat(ChatId),
}

impl GroupKey {
    /// Personal group for `user_id`.
    #[must_use]
    pub const fn user(user_id: UserId) -> Self {
        Self::User(user_id)
    }

    /// Relay group for `chat_id`.
    #[must_use]
    pub const fn chat(chat_id: ChatId) -> Self {
        Self::Chat(chat_id)
    }
}

impl fmt::Display for GroupKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::User(id) => write!(f, "user_{id}"),
            Self::Chat(id) => write!(f, "chat_{id}"),
        }
    }
}

impl FromStr for GroupKey {
    type Err = RelayError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || RelayError::InvalidRequest(format!("invalid group key: {s}"));
        let (prefix, raw) = s.split_once('_').ok_or_else(invalid)?;
        let id: i64 = raw.parse().map_err(|_| invalid())?;
        match prefix {
            "user" => Ok(Self::User(UserId::new(id))),
            "chat" => Ok(Self::Chat(ChatId::new(id))),
            _ => Err(invalid()),
        }
    }
}

impl Serialize for GroupKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for GroupKey {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}
