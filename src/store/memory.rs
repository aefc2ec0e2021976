//! In-process store for development and tests.
//!
//! Everything lives in one [`tokio::sync::RwLock`]. The store can be told
//! to fail every call with [`MemoryStore::set_unavailable`], which is how
//! tests exercise the "backend down" paths.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;

use super::{ChatStore, NotificationStore, UserStore};
use crate::domain::{
    ChatId, ChatRecord, MessageId, MessageRecord, NewMessage, NewNotification, NotificationFilter,
    NotificationId, NotificationPage, NotificationRecord, NotificationStats, PageRequest, Role,
    UserId, UserRecord,
};
use crate::error::RelayError;

#[derive(Debug, Default)]
struct Tables {
    users: BTreeMap<UserId, UserRecord>,
    chats: BTreeMap<ChatId, ChatRecord>,
    messages: BTreeMap<MessageId, MessageRecord>,
    notifications: BTreeMap<NotificationId, NotificationRecord>,
    next_chat: i64,
    next_message: i64,
    next_notification: i64,
}

/// Volatile store implementing every store trait.
#[derive(Debug, Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
    unavailable: AtomicBool,
}

impl MemoryStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts or replaces a user row.
    pub async fn seed_user(&self, user: UserRecord) {
        self.tables.write().await.users.insert(user.id, user);
    }

    /// Inserts a chat with a caller-chosen id.
    pub async fn seed_chat(&self, chat: ChatRecord) {
        let mut tables = self.tables.write().await;
        tables.next_chat = tables.next_chat.max(chat.id.get());
        tables.chats.insert(chat.id, chat);
    }

    /// Makes every subsequent call fail (or succeed again).
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    fn check(&self) -> Result<(), RelayError> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(RelayError::Persistence(
                "memory store marked unavailable".to_string(),
            ));
        }
        Ok(())
    }
}

#[async_trait]
impl NotificationStore for MemoryStore {
    async fn insert_notification(
        &self,
        draft: NewNotification,
    ) -> Result<NotificationRecord, RelayError> {
        self.check()?;
        let mut tables = self.tables.write().await;
        tables.next_notification += 1;
        let record = NotificationRecord {
            id: NotificationId::new(tables.next_notification),
            user_id: draft.user_id,
            title: draft.title,
            content: draft.content,
            notification_type: draft.notification_type,
            is_read: false,
            is_important: draft.is_important,
            action_url: draft.action_url,
            reference: draft.reference,
            created_at: Utc::now(),
            read_at: None,
        };
        tables.notifications.insert(record.id, record.clone());
        Ok(record)
    }

    async fn list_notifications(
        &self,
        user_id: UserId,
        filter: NotificationFilter,
    ) -> Result<Vec<NotificationRecord>, RelayError> {
        self.check()?;
        let tables = self.tables.read().await;
        let mut records: Vec<NotificationRecord> = tables
            .notifications
            .values()
            .filter(|n| n.user_id == user_id && filter.matches(n))
            .cloned()
            .collect();
        records.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        Ok(records)
    }

    async fn page_notifications(
        &self,
        user_id: UserId,
        filter: NotificationFilter,
        page: PageRequest,
    ) -> Result<NotificationPage, RelayError> {
        let records = self.list_notifications(user_id, filter).await?;
        let total = records.len() as u64;
        let records = records
            .into_iter()
            .skip(usize::try_from(page.offset).unwrap_or(usize::MAX))
            .take(usize::try_from(page.limit).unwrap_or(usize::MAX))
            .collect();
        Ok(NotificationPage { records, total })
    }

    async fn mark_notification_read(
        &self,
        user_id: UserId,
        id: NotificationId,
    ) -> Result<Option<NotificationRecord>, RelayError> {
        self.check()?;
        let mut tables = self.tables.write().await;
        let Some(record) = tables
            .notifications
            .get_mut(&id)
            .filter(|n| n.user_id == user_id)
        else {
            return Ok(None);
        };
        record.mark_read(Utc::now());
        Ok(Some(record.clone()))
    }

    async fn mark_all_notifications_read(&self, user_id: UserId) -> Result<u64, RelayError> {
        self.check()?;
        let now = Utc::now();
        let mut tables = self.tables.write().await;
        let updated = tables
            .notifications
            .values_mut()
            .filter(|n| n.user_id == user_id)
            .map(|n| n.mark_read(now))
            .filter(|changed| *changed)
            .count();
        Ok(updated as u64)
    }

    async fn delete_notification(
        &self,
        user_id: UserId,
        id: NotificationId,
    ) -> Result<bool, RelayError> {
        self.check()?;
        let mut tables = self.tables.write().await;
        if !tables.notifications.get(&id).is_some_and(|n| n.user_id == user_id) {
            return Ok(false);
        }
        tables.notifications.remove(&id);
        Ok(true)
    }

    async fn notification_stats(&self, user_id: UserId) -> Result<NotificationStats, RelayError> {
        self.check()?;
        let tables = self.tables.read().await;
        Ok(NotificationStats::from_records(
            tables.notifications.values().filter(|n| n.user_id == user_id),
        ))
    }
}

#[async_trait]
impl ChatStore for MemoryStore {
    async fn get_chat(&self, id: ChatId) -> Result<Option<ChatRecord>, RelayError> {
        self.check()?;
        Ok(self.tables.read().await.chats.get(&id).cloned())
    }

    async fn find_chat_between(
        &self,
        a: UserId,
        b: UserId,
    ) -> Result<Option<ChatRecord>, RelayError> {
        self.check()?;
        let tables = self.tables.read().await;
        Ok(tables
            .chats
            .values()
            .find(|c| c.is_participant(a) && c.is_participant(b))
            .cloned())
    }

    async fn insert_chat(
        &self,
        initiator: UserId,
        recipient: UserId,
    ) -> Result<ChatRecord, RelayError> {
        self.check()?;
        let mut tables = self.tables.write().await;
        tables.next_chat += 1;
        let chat = ChatRecord {
            id: ChatId::new(tables.next_chat),
            initiator_id: initiator,
            recipient_id: recipient,
            is_active: true,
            created_at: Utc::now(),
        };
        tables.chats.insert(chat.id, chat.clone());
        Ok(chat)
    }

    async fn insert_message(&self, draft: NewMessage) -> Result<MessageRecord, RelayError> {
        self.check()?;
        let mut tables = self.tables.write().await;
        if !tables.chats.contains_key(&draft.chat_id) {
            return Err(RelayError::Persistence(format!(
                "foreign key violation: chat {} does not exist",
                draft.chat_id
            )));
        }
        tables.next_message += 1;
        let message = MessageRecord {
            id: MessageId::new(tables.next_message),
            chat_id: draft.chat_id,
            sender_id: draft.sender_id,
            content: draft.content,
            message_type: draft.message_type,
            is_read: false,
            created_at: Utc::now(),
        };
        tables.messages.insert(message.id, message.clone());
        Ok(message)
    }

    async fn list_messages(&self, chat_id: ChatId) -> Result<Vec<MessageRecord>, RelayError> {
        self.check()?;
        let tables = self.tables.read().await;
        let mut messages: Vec<MessageRecord> = tables
            .messages
            .values()
            .filter(|m| m.chat_id == chat_id)
            .cloned()
            .collect();
        messages.sort_by(MessageRecord::chronological);
        Ok(messages)
    }
}

#[async_trait]
impl UserStore for MemoryStore {
    async fn get_user(&self, id: UserId) -> Result<Option<UserRecord>, RelayError> {
        self.check()?;
        Ok(self.tables.read().await.users.get(&id).cloned())
    }

    async fn admins(&self) -> Result<Vec<UserRecord>, RelayError> {
        self.check()?;
        let tables = self.tables.read().await;
        Ok(tables
            .users
            .values()
            .filter(|u| u.role == Role::Admin)
            .cloned()
            .collect())
    }

    async fn set_presence(&self, id: UserId, online: bool) -> Result<(), RelayError> {
        self.check()?;
        let mut tables = self.tables.write().await;
        let user = tables
            .users
            .get_mut(&id)
            .ok_or_else(|| RelayError::not_found("user", id))?;
        user.is_online = online;
        user.last_seen = Some(Utc::now());
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;
    use crate::domain::{MessageType, NotificationType};

    fn draft(user: i64) -> NewNotification {
        NewNotification::new(UserId::new(user), NotificationType::System, "t", "c")
    }

    #[tokio::test]
    async fn notifications_are_scoped_to_owner() {
        let store = MemoryStore::new();
        let Ok(mine) = store.insert_notification(draft(1)).await else {
            panic!("insert failed");
        };
        let _ = store.insert_notification(draft(2)).await;

        let listed = store
            .list_notifications(UserId::new(1), NotificationFilter::default())
            .await
            .unwrap_or_default();
        assert_eq!(listed.len(), 1);

        let foreign = store.mark_notification_read(UserId::new(2), mine.id).await;
        assert!(matches!(foreign, Ok(None)));
    }

    #[tokio::test]
    async fn delete_only_removes_own_rows() {
        let store = MemoryStore::new();
        let Ok(rec) = store.insert_notification(draft(1)).await else {
            panic!("insert failed");
        };

        assert_eq!(store.delete_notification(UserId::new(2), rec.id).await.ok(), Some(false));
        assert_eq!(store.delete_notification(UserId::new(1), rec.id).await.ok(), Some(true));
        assert_eq!(store.delete_notification(UserId::new(1), rec.id).await.ok(), Some(false));
        let listed = store
            .list_notifications(UserId::new(1), NotificationFilter::default())
            .await
            .unwrap_or_default();
        assert!(listed.is_empty());
    }

    #[tokio::test]
    async fn page_reports_total_across_pages() {
        let store = MemoryStore::new();
        for _ in 0..5 {
            let _ = store.insert_notification(draft(1)).await;
        }
        let _ = store.insert_notification(draft(2)).await;

        let Ok(page) = store
            .page_notifications(
                UserId::new(1),
                NotificationFilter::default(),
                PageRequest { offset: 4, limit: 2 },
            )
            .await
        else {
            panic!("page failed");
        };
        assert_eq!(page.total, 5);
        assert_eq!(page.records.len(), 1);
        assert_eq!(page.records.first().map(|n| n.id), Some(NotificationId::new(1)));
    }

    #[tokio::test]
    async fn mark_read_is_idempotent() {
        let store = MemoryStore::new();
        let Ok(rec) = store.insert_notification(draft(1)).await else {
            panic!("insert failed");
        };
        let Ok(Some(first)) = store.mark_notification_read(UserId::new(1), rec.id).await else {
            panic!("mark failed");
        };
        let Ok(Some(second)) = store.mark_notification_read(UserId::new(1), rec.id).await else {
            panic!("mark failed");
        };
        assert!(first.is_read);
        assert_eq!(first.read_at, second.read_at);
        assert_eq!(first.created_at, second.created_at);
    }

    #[tokio::test]
    async fn mark_all_counts_only_transitions() {
        let store = MemoryStore::new();
        let Ok(rec) = store.insert_notification(draft(1)).await else {
            panic!("insert failed");
        };
        let _ = store.insert_notification(draft(1)).await;
        let _ = store.mark_notification_read(UserId::new(1), rec.id).await;

        assert_eq!(store.mark_all_notifications_read(UserId::new(1)).await.ok(), Some(1));
        assert_eq!(store.mark_all_notifications_read(UserId::new(1)).await.ok(), Some(0));
    }

    #[tokio::test]
    async fn messages_list_in_write_order() {
        let store = MemoryStore::new();
        let Ok(chat) = store.insert_chat(UserId::new(1), UserId::new(2)).await else {
            panic!("insert chat failed");
        };
        for text in ["a", "b", "c"] {
            let msg = NewMessage {
                chat_id: chat.id,
                sender_id: UserId::new(1),
                content: text.to_string(),
                message_type: MessageType::Text,
            };
            let _ = store.insert_message(msg).await;
        }
        let contents: Vec<String> = store
            .list_messages(chat.id)
            .await
            .unwrap_or_default()
            .into_iter()
            .map(|m| m.content)
            .collect();
        assert_eq!(contents, vec!["a", "b", "c"]);
    }

    #[tokio::test]
    async fn unavailable_store_fails_every_call() {
        let store = MemoryStore::new();
        store.set_unavailable(true);
        assert!(store.insert_notification(draft(1)).await.is_err());
        assert!(store.get_chat(ChatId::new(1)).await.is_err());
        store.set_unavailable(false);
        assert!(store.get_chat(ChatId::new(1)).await.is_ok());
    }

    #[tokio::test]
    async fn seeded_chat_ids_are_not_reused() {
        let store = MemoryStore::new();
        store
            .seed_chat(ChatRecord {
                id: ChatId::new(42),
                initiator_id: UserId::new(1),
                recipient_id: UserId::new(2),
                is_active: true,
                created_at: Utc::now(),
            })
            .await;
        let Ok(next) = store.insert_chat(UserId::new(3), UserId::new(4)).await else {
            panic!("insert chat failed");
        };
        assert_eq!(next.id, ChatId::new(43));
    }
}
