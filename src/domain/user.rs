//! Marketplace identities as seen by the relay.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::UserId;
use crate::error::RelayError;

/// Role of a user in the two-sided marketplace.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// Platform administrator. Receives copies of system-wide events.
    Admin,
    /// Content moderator.
    Moderator,
    /// Service provider side of the marketplace.
    Plumber,
    /// Customer side of the marketplace.
    Client,
}

impl Role {
    /// Returns the role as stored in the database.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Admin => "admin",
            Self::Moderator => "moderator",
            Self::Plumber => "plumber",
            Self::Client => "client",
        }
    }

    /// Returns `true` for the two roles that may take part in a chat.
    #[must_use]
    pub const fn is_marketplace_party(self) -> bool {
        matches!(self, Self::Plumber | Self::Client)
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = RelayError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "admin" => Ok(Self::Admin),
            "moderator" => Ok(Self::Moderator),
            "plumber" => Ok(Self::Plumber),
            "client" => Ok(Self::Client),
            other => Err(RelayError::Persistence(format!("unknown role: {other}"))),
        }
    }
}

/// A user row, owned by the identity system.
///
/// The relay reads `name` and `role`; it writes only the presence fields.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UserRecord {
    /// User identifier.
    pub id: UserId,
    /// Display name.
    pub name: String,
    /// Marketplace role.
    pub role: Role,
    /// Whether the user currently has at least one live connection.
    pub is_online: bool,
    /// Last presence transition.
    pub last_seen: Option<DateTime<Utc>>,
}

impl UserRecord {
    /// Creates an offline user.
    #[must_use]
    pub fn new(id: UserId, name: impl Into<String>, role: Role) -> Self {
        Self {
            id,
            name: name.into(),
            role,
            is_online: false,
            last_seen: None,
        }
    }
}
