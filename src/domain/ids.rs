//! Type-safe identifiers.
//!
//! Database-backed entities use `i64` primary keys wrapped in newtypes so
//! that a [`ChatId`] can never be passed where a [`UserId`] is expected.
//! Live connections are identified by a random [`ConnectionId`] (UUID v4)
//! that only exists for the lifetime of the socket.

use std::fmt;

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

macro_rules! row_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(
            Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, ToSchema,
        )]
        #[serde(transparent)]
        pub struct $name(i64);

        impl $name {
            /// Wraps a raw primary key.
            #[must_use]
            pub const fn new(raw: i64) -> Self {
                Self(raw)
            }

            /// Returns the raw primary key.
            #[must_use]
            pub const fn get(self) -> i64 {
                self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<i64> for $name {
            fn from(raw: i64) -> Self {
                Self(raw)
            }
        }

        impl From<$name> for i64 {
            fn from(id: $name) -> Self {
                id.0
            }
        }
    };
}

row_id!(
    /// Identifier of a marketplace user (client, plumber, admin, moderator).
    UserId
);
row_id!(
    /// Identifier of a two-party chat.
    ChatId
);
row_id!(
    /// Identifier of a chat message.
    MessageId
);
row_id!(
    /// Identifier of a durable notification record.
    NotificationId
);
row_id!(
    /// Identifier of a complaint filed by a user.
    ComplaintId
);
row_id!(
    /// Identifier of a service request a client sent to a plumber.
    ServiceId
);

/// Identifier of one live websocket connection.
///
/// Generated when the handshake succeeds and discarded when the socket
/// closes. Never persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConnectionId(uuid::Uuid);

impl ConnectionId {
    /// Creates a new random `ConnectionId` (UUID v4).
    #[must_use]
    pub fn new() -> Self {
        Self(uuid::Uuid::new_v4())
    }

    /// Returns the inner [`uuid::Uuid`].
    #[must_use]
    pub const fn as_uuid(&self) -> &uuid::Uuid {
        &self.0
    }
}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
