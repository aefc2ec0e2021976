//! Durable storage behind the write paths and reconciliation reads.
//!
//! Three object-safe traits split the tables by concern. Both
//! implementations ([`MemoryStore`] and [`PostgresStore`]) implement all
//! three, and the composition root hands the same instance out as each
//! trait object.

pub mod memory;
pub mod postgres;

use std::fmt;

use async_trait::async_trait;

use crate::domain::{
    ChatId, ChatRecord, MessageRecord, NewMessage, NewNotification, NotificationFilter,
    NotificationId, NotificationPage, NotificationRecord, NotificationStats, PageRequest, UserId,
    UserRecord,
};
use crate::error::RelayError;

pub use memory::MemoryStore;
pub use postgres::PostgresStore;

/// Per-user notification records.
#[async_trait]
pub trait NotificationStore: Send + Sync + fmt::Debug {
    /// Persists a new notification and returns the stored row.
    ///
    /// # Errors
    ///
    /// Returns [`RelayError::Persistence`] on backend failure.
    async fn insert_notification(
        &self,
        draft: NewNotification,
    ) -> Result<NotificationRecord, RelayError>;

    /// Lists `user_id`'s notifications, newest first.
    ///
    /// # Errors
    ///
    /// Returns [`RelayError::Persistence`] on backend failure.
    async fn list_notifications(
        &self,
        user_id: UserId,
        filter: NotificationFilter,
    ) -> Result<Vec<NotificationRecord>, RelayError>;

    /// One page of `user_id`'s notifications, newest first, with the total
    /// number matching `filter`.
    ///
    /// # Errors
    ///
    /// Returns [`RelayError::Persistence`] on backend failure.
    async fn page_notifications(
        &self,
        user_id: UserId,
        filter: NotificationFilter,
        page: PageRequest,
    ) -> Result<NotificationPage, RelayError>;

    /// Marks one of `user_id`'s notifications read. Idempotent: an
    /// already-read record is returned unchanged.
    ///
    /// Returns `None` if the notification does not exist or belongs to
    /// someone else.
    ///
    /// # Errors
    ///
    /// Returns [`RelayError::Persistence`] on backend failure.
    async fn mark_notification_read(
        &self,
        user_id: UserId,
        id: NotificationId,
    ) -> Result<Option<NotificationRecord>, RelayError>;

    /// Marks every unread notification of `user_id` read and returns how
    /// many changed.
    ///
    /// # Errors
    ///
    /// Returns [`RelayError::Persistence`] on backend failure.
    async fn mark_all_notifications_read(&self, user_id: UserId) -> Result<u64, RelayError>;

    /// Deletes one of `user_id`'s notifications.
    ///
    /// Returns `false` if the notification does not exist or belongs to
    /// someone else; nothing is deleted in that case.
    ///
    /// # Errors
    ///
    /// Returns [`RelayError::Persistence`] on backend failure.
    async fn delete_notification(
        &self,
        user_id: UserId,
        id: NotificationId,
    ) -> Result<bool, RelayError>;

    /// Counters over `user_id`'s notifications.
    ///
    /// # Errors
    ///
    /// Returns [`RelayError::Persistence`] on backend failure.
    async fn notification_stats(&self, user_id: UserId) -> Result<NotificationStats, RelayError>;
}

/// Chats and messages.
#[async_trait]
pub trait ChatStore: Send + Sync + fmt::Debug {
    /// Looks up a chat.
    ///
    /// # Errors
    ///
    /// Returns [`RelayError::Persistence`] on backend failure.
    async fn get_chat(&self, id: ChatId) -> Result<Option<ChatRecord>, RelayError>;

    /// Returns the chat between the two users, in either direction.
    ///
    /// # Errors
    ///
    /// Returns [`RelayError::Persistence`] on backend failure.
    async fn find_chat_between(
        &self,
        a: UserId,
        b: UserId,
    ) -> Result<Option<ChatRecord>, RelayError>;

    /// Persists a new active chat.
    ///
    /// # Errors
    ///
    /// Returns [`RelayError::Persistence`] on backend failure.
    async fn insert_chat(
        &self,
        initiator: UserId,
        recipient: UserId,
    ) -> Result<ChatRecord, RelayError>;

    /// Persists a message.
    ///
    /// # Errors
    ///
    /// Returns [`RelayError::Persistence`] on backend failure.
    async fn insert_message(&self, draft: NewMessage) -> Result<MessageRecord, RelayError>;

    /// Messages of a chat in chronological order.
    ///
    /// # Errors
    ///
    /// Returns [`RelayError::Persistence`] on backend failure.
    async fn list_messages(&self, chat_id: ChatId) -> Result<Vec<MessageRecord>, RelayError>;
}

/// Users as seen by the relay.
#[async_trait]
pub trait UserStore: Send + Sync + fmt::Debug {
    /// Looks up a user.
    ///
    /// # Errors
    ///
    /// Returns [`RelayError::Persistence`] on backend failure.
    async fn get_user(&self, id: UserId) -> Result<Option<UserRecord>, RelayError>;

    /// All users with the `admin` role.
    ///
    /// # Errors
    ///
    /// Returns [`RelayError::Persistence`] on backend failure.
    async fn admins(&self) -> Result<Vec<UserRecord>, RelayError>;

    /// Updates the presence flag and `last_seen`.
    ///
    /// # Errors
    ///
    /// Returns [`RelayError::Persistence`] on backend failure.
    async fn set_presence(&self, id: UserId, online: bool) -> Result<(), RelayError>;
}
