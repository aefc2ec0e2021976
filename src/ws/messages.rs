//! Frames a client may send on an open websocket.
//!
//! Every frame is a JSON object with a `"type"` discriminator:
//!
//! ```json
//! {"type": "ping"}
//! {"type": "chat_message", "content": "hello", "message_type": "text"}
//! {"type": "mark_read", "notification_id": 12}
//! ```
//!
//! Server frames are [`crate::domain::ServerEvent`].

use serde::Deserialize;

use crate::domain::{MessageType, NotificationId};
use crate::error::RelayError;

/// Inbound client frame.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientFrame {
    /// Keep-alive; answered with `pong`.
    Ping,
    /// Post into the chat this connection was opened on.
    ChatMessage {
        /// Message text.
        content: String,
        /// Message kind, `text` when omitted.
        #[serde(default)]
        message_type: MessageType,
    },
    /// Mark one of the caller's notifications read.
    MarkRead {
        /// Target notification.
        notification_id: NotificationId,
    },
}

impl ClientFrame {
    /// Parses a text frame.
    ///
    /// # Errors
    ///
    /// Returns [`RelayError::InvalidFrame`] for anything that is not one of
    /// the known frame shapes.
    pub fn parse(text: &str) -> Result<Self, RelayError> {
        serde_json::from_str(text).map_err(|e| RelayError::InvalidFrame(e.to_string()))
    }
}
