//! PostgreSQL implementation of the store traits.
//!
//! Rows are read as tuples and mapped into domain records by hand; the
//! schema lives in `migrations/` and is applied at startup.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;

use super::{ChatStore, NotificationStore, UserStore};
use crate::domain::{
    ChatId, ChatRecord, ContentRef, MessageId, MessageRecord, NewMessage, NewNotification,
    NotificationFilter, NotificationId, NotificationPage, NotificationRecord, NotificationStats,
    NotificationType, PageRequest, Role, UserId, UserRecord,
};
use crate::error::RelayError;

const NOTIFICATION_COLUMNS: &str = "id, user_id, title, content, notification_type, is_read, \
     is_important, action_url, content_type, object_id, created_at, read_at";

const NOTIFICATION_FILTER: &str = "user_id = $1 \
     AND ($2::boolean IS NULL OR is_read = $2) \
     AND ($3::text IS NULL OR notification_type = $3) \
     AND ($4::boolean IS NULL OR is_important = $4)";

type NotificationRow = (
    i64,
    i64,
    String,
    String,
    String,
    bool,
    bool,
    Option<String>,
    Option<String>,
    Option<i64>,
    DateTime<Utc>,
    Option<DateTime<Utc>>,
);

type ChatRow = (i64, i64, i64, bool, DateTime<Utc>);

type MessageRow = (i64, i64, i64, String, String, bool, DateTime<Utc>);

type UserRow = (i64, String, String, bool, Option<DateTime<Utc>>);

fn notification_from_row(row: NotificationRow) -> Result<NotificationRecord, RelayError> {
    let (
        id,
        user_id,
        title,
        content,
        notification_type,
        is_read,
        is_important,
        action_url,
        content_type,
        object_id,
        created_at,
        read_at,
    ) = row;
    Ok(NotificationRecord {
        id: NotificationId::new(id),
        user_id: UserId::new(user_id),
        title,
        content,
        notification_type: notification_type.parse()?,
        is_read,
        is_important,
        action_url,
        reference: ContentRef::from_columns(content_type.as_deref(), object_id),
        created_at,
        read_at,
    })
}

fn chat_from_row((id, initiator_id, recipient_id, is_active, created_at): ChatRow) -> ChatRecord {
    ChatRecord {
        id: ChatId::new(id),
        initiator_id: UserId::new(initiator_id),
        recipient_id: UserId::new(recipient_id),
        is_active,
        created_at,
    }
}

fn message_from_row(row: MessageRow) -> Result<MessageRecord, RelayError> {
    let (id, chat_id, sender_id, content, message_type, is_read, created_at) = row;
    Ok(MessageRecord {
        id: MessageId::new(id),
        chat_id: ChatId::new(chat_id),
        sender_id: UserId::new(sender_id),
        content,
        message_type: message_type.parse()?,
        is_read,
        created_at,
    })
}

fn user_from_row((id, name, role, is_online, last_seen): UserRow) -> Result<UserRecord, RelayError> {
    Ok(UserRecord {
        id: UserId::new(id),
        name,
        role: role.parse()?,
        is_online,
        last_seen,
    })
}

fn count(n: i64) -> u64 {
    u64::try_from(n).unwrap_or(0)
}

/// PostgreSQL-backed store using `sqlx::PgPool`.
#[derive(Debug, Clone)]
pub struct PostgresStore {
    pool: PgPool,
}

impl PostgresStore {
    /// Creates a store over the given connection pool.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Applies pending schema migrations.
    ///
    /// # Errors
    ///
    /// Returns a [`RelayError::Persistence`] if a migration fails.
    pub async fn migrate(&self) -> Result<(), RelayError> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| RelayError::Persistence(format!("migration failed: {e}")))
    }
}

#[async_trait]
impl NotificationStore for PostgresStore {
    async fn insert_notification(
        &self,
        draft: NewNotification,
    ) -> Result<NotificationRecord, RelayError> {
        let row = sqlx::query_as::<_, NotificationRow>(&format!(
            "INSERT INTO notifications \
             (user_id, title, content, notification_type, is_important, action_url, content_type, object_id) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8) RETURNING {NOTIFICATION_COLUMNS}"
        ))
        .bind(draft.user_id.get())
        .bind(&draft.title)
        .bind(&draft.content)
        .bind(draft.notification_type.as_str())
        .bind(draft.is_important)
        .bind(draft.action_url.as_deref())
        .bind(draft.reference.as_ref().map(ContentRef::content_type))
        .bind(draft.reference.as_ref().map(ContentRef::object_id))
        .fetch_one(&self.pool)
        .await?;

        notification_from_row(row)
    }

    async fn list_notifications(
        &self,
        user_id: UserId,
        filter: NotificationFilter,
    ) -> Result<Vec<NotificationRecord>, RelayError> {
        let rows = sqlx::query_as::<_, NotificationRow>(&format!(
            "SELECT {NOTIFICATION_COLUMNS} FROM notifications \
             WHERE {NOTIFICATION_FILTER} \
             ORDER BY created_at DESC, id DESC"
        ))
        .bind(user_id.get())
        .bind(filter.is_read)
        .bind(filter.notification_type.map(NotificationType::as_str))
        .bind(filter.is_important)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(notification_from_row).collect()
    }

    async fn page_notifications(
        &self,
        user_id: UserId,
        filter: NotificationFilter,
        page: PageRequest,
    ) -> Result<NotificationPage, RelayError> {
        let notification_type = filter.notification_type.map(NotificationType::as_str);

        let (total,) = sqlx::query_as::<_, (i64,)>(&format!(
            "SELECT COUNT(*) FROM notifications WHERE {NOTIFICATION_FILTER}"
        ))
        .bind(user_id.get())
        .bind(filter.is_read)
        .bind(notification_type)
        .bind(filter.is_important)
        .fetch_one(&self.pool)
        .await?;

        let rows = sqlx::query_as::<_, NotificationRow>(&format!(
            "SELECT {NOTIFICATION_COLUMNS} FROM notifications \
             WHERE {NOTIFICATION_FILTER} \
             ORDER BY created_at DESC, id DESC \
             LIMIT $5 OFFSET $6"
        ))
        .bind(user_id.get())
        .bind(filter.is_read)
        .bind(notification_type)
        .bind(filter.is_important)
        .bind(i64::try_from(page.limit).unwrap_or(i64::MAX))
        .bind(i64::try_from(page.offset).unwrap_or(i64::MAX))
        .fetch_all(&self.pool)
        .await?;

        Ok(NotificationPage {
            records: rows
                .into_iter()
                .map(notification_from_row)
                .collect::<Result<_, _>>()?,
            total: count(total),
        })
    }

    async fn mark_notification_read(
        &self,
        user_id: UserId,
        id: NotificationId,
    ) -> Result<Option<NotificationRecord>, RelayError> {
        let row = sqlx::query_as::<_, NotificationRow>(&format!(
            "UPDATE notifications SET is_read = TRUE, read_at = COALESCE(read_at, now()) \
             WHERE id = $1 AND user_id = $2 RETURNING {NOTIFICATION_COLUMNS}"
        ))
        .bind(id.get())
        .bind(user_id.get())
        .fetch_optional(&self.pool)
        .await?;

        row.map(notification_from_row).transpose()
    }

    async fn mark_all_notifications_read(&self, user_id: UserId) -> Result<u64, RelayError> {
        let result = sqlx::query(
            "UPDATE notifications SET is_read = TRUE, read_at = now() \
             WHERE user_id = $1 AND is_read = FALSE",
        )
        .bind(user_id.get())
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }

    async fn delete_notification(
        &self,
        user_id: UserId,
        id: NotificationId,
    ) -> Result<bool, RelayError> {
        let result = sqlx::query("DELETE FROM notifications WHERE id = $1 AND user_id = $2")
            .bind(id.get())
            .bind(user_id.get())
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn notification_stats(&self, user_id: UserId) -> Result<NotificationStats, RelayError> {
        let (total, unread, important) = sqlx::query_as::<_, (i64, i64, i64)>(
            "SELECT COUNT(*), \
                    COUNT(*) FILTER (WHERE NOT is_read), \
                    COUNT(*) FILTER (WHERE NOT is_read AND is_important) \
             FROM notifications WHERE user_id = $1",
        )
        .bind(user_id.get())
        .fetch_one(&self.pool)
        .await?;

        let by_type = sqlx::query_as::<_, (String, i64)>(
            "SELECT notification_type, COUNT(*) FROM notifications \
             WHERE user_id = $1 GROUP BY notification_type",
        )
        .bind(user_id.get())
        .fetch_all(&self.pool)
        .await?;

        let mut stats = NotificationStats::zeroed();
        stats.total_notifications = count(total);
        stats.unread_notifications = count(unread);
        stats.important_notifications = count(important);
        for (notification_type, n) in by_type {
            stats
                .notifications_by_type
                .insert(notification_type.parse()?, count(n));
        }
        Ok(stats)
    }
}

#[async_trait]
impl ChatStore for PostgresStore {
    async fn get_chat(&self, id: ChatId) -> Result<Option<ChatRecord>, RelayError> {
        let row = sqlx::query_as::<_, ChatRow>(
            "SELECT id, initiator_id, recipient_id, is_active, created_at FROM chats WHERE id = $1",
        )
        .bind(id.get())
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(chat_from_row))
    }

    async fn find_chat_between(
        &self,
        a: UserId,
        b: UserId,
    ) -> Result<Option<ChatRecord>, RelayError> {
        let row = sqlx::query_as::<_, ChatRow>(
            "SELECT id, initiator_id, recipient_id, is_active, created_at FROM chats \
             WHERE (initiator_id = $1 AND recipient_id = $2) \
                OR (initiator_id = $2 AND recipient_id = $1) \
             ORDER BY id LIMIT 1",
        )
        .bind(a.get())
        .bind(b.get())
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(chat_from_row))
    }

    async fn insert_chat(
        &self,
        initiator: UserId,
        recipient: UserId,
    ) -> Result<ChatRecord, RelayError> {
        let row = sqlx::query_as::<_, ChatRow>(
            "INSERT INTO chats (initiator_id, recipient_id) VALUES ($1, $2) \
             RETURNING id, initiator_id, recipient_id, is_active, created_at",
        )
        .bind(initiator.get())
        .bind(recipient.get())
        .fetch_one(&self.pool)
        .await?;

        Ok(chat_from_row(row))
    }

    async fn insert_message(&self, draft: NewMessage) -> Result<MessageRecord, RelayError> {
        let row = sqlx::query_as::<_, MessageRow>(
            "INSERT INTO messages (chat_id, sender_id, content, message_type) \
             VALUES ($1, $2, $3, $4) \
             RETURNING id, chat_id, sender_id, content, message_type, is_read, created_at",
        )
        .bind(draft.chat_id.get())
        .bind(draft.sender_id.get())
        .bind(&draft.content)
        .bind(draft.message_type.as_str())
        .fetch_one(&self.pool)
        .await?;

        message_from_row(row)
    }

    async fn list_messages(&self, chat_id: ChatId) -> Result<Vec<MessageRecord>, RelayError> {
        let rows = sqlx::query_as::<_, MessageRow>(
            "SELECT id, chat_id, sender_id, content, message_type, is_read, created_at \
             FROM messages WHERE chat_id = $1 ORDER BY created_at ASC, id ASC",
        )
        .bind(chat_id.get())
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(message_from_row).collect()
    }
}

#[async_trait]
impl UserStore for PostgresStore {
    async fn get_user(&self, id: UserId) -> Result<Option<UserRecord>, RelayError> {
        let row = sqlx::query_as::<_, UserRow>(
            "SELECT id, name, role, is_online, last_seen FROM users WHERE id = $1",
        )
        .bind(id.get())
        .fetch_optional(&self.pool)
        .await?;

        row.map(user_from_row).transpose()
    }

    async fn admins(&self) -> Result<Vec<UserRecord>, RelayError> {
        let rows = sqlx::query_as::<_, UserRow>(
            "SELECT id, name, role, is_online, last_seen FROM users WHERE role = $1 ORDER BY id",
        )
        .bind(Role::Admin.as_str())
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(user_from_row).collect()
    }

    async fn set_presence(&self, id: UserId, online: bool) -> Result<(), RelayError> {
        let result =
            sqlx::query("UPDATE users SET is_online = $2, last_seen = now() WHERE id = $1")
                .bind(id.get())
                .bind(online)
                .execute(&self.pool)
                .await?;

        if result.rows_affected() == 0 {
            return Err(RelayError::not_found("user", id));
        }
        Ok(())
    }
}
