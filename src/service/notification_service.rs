//! Notification write path and reconciliation reads.

use std::sync::Arc;

use crate::domain::{
    ChatRecord, ComplaintId, ContentRef, FanoutDispatcher, GroupKey, MessageRecord,
    NewNotification, NotificationFilter, NotificationId, NotificationPage, NotificationRecord,
    NotificationStats, NotificationType, PageRequest, ServerEvent, ServiceId, UserId, UserRecord,
};
use crate::error::RelayError;
use crate::store::{NotificationStore, UserStore};

/// Persists notifications and pushes them to the recipient's personal group.
///
/// Every write follows the same order: insert the row, then dispatch to
/// `user_{id}`. A failed insert returns before anything is pushed; a push
/// that reaches nobody leaves the row for the REST reads to pick up.
#[derive(Debug, Clone)]
pub struct NotificationService {
    store: Arc<dyn NotificationStore>,
    users: Arc<dyn UserStore>,
    dispatcher: Arc<FanoutDispatcher>,
    notify_admins: bool,
}

impl NotificationService {
    /// Creates a new `NotificationService`.
    #[must_use]
    pub fn new(
        store: Arc<dyn NotificationStore>,
        users: Arc<dyn UserStore>,
        dispatcher: Arc<FanoutDispatcher>,
    ) -> Self {
        Self {
            store,
            users,
            dispatcher,
            notify_admins: true,
        }
    }

    /// Enables or disables admin copies of marketplace events.
    #[must_use]
    pub fn with_admin_copies(mut self, enabled: bool) -> Self {
        self.notify_admins = enabled;
        self
    }

    /// Persists one notification and pushes it to its recipient.
    ///
    /// # Errors
    ///
    /// Returns [`RelayError::Persistence`] if the insert fails; nothing is
    /// pushed in that case.
    pub async fn notify(&self, draft: NewNotification) -> Result<NotificationRecord, RelayError> {
        let record = self.store.insert_notification(draft).await?;
        let report = self
            .dispatcher
            .dispatch(GroupKey::user(record.user_id), &ServerEvent::notification(&record))
            .await;
        tracing::debug!(
            notification_id = %record.id,
            user_id = %record.user_id,
            kind = record.notification_type.as_str(),
            delivered = report.delivered,
            "notification stored"
        );
        Ok(record)
    }

    /// Sends a copy of `draft` to every admin except `skip`.
    ///
    /// Failures for one admin are logged and do not stop the others.
    ///
    /// # Errors
    ///
    /// Returns [`RelayError::Persistence`] if the admin list cannot be read.
    pub async fn notify_admins(
        &self,
        draft: &NewNotification,
        skip: Option<UserId>,
    ) -> Result<Vec<NotificationRecord>, RelayError> {
        if !self.notify_admins {
            return Ok(Vec::new());
        }
        self.copy_to_admins(draft, skip).await
    }

    async fn copy_to_admins(
        &self,
        draft: &NewNotification,
        skip: Option<UserId>,
    ) -> Result<Vec<NotificationRecord>, RelayError> {
        let admins = self.users.admins().await?;
        let mut records = Vec::with_capacity(admins.len());
        for admin in admins.into_iter().filter(|a| Some(a.id) != skip) {
            match self.notify(draft.readdressed(admin.id)).await {
                Ok(record) => records.push(record),
                Err(e) => tracing::warn!(admin_id = %admin.id, error = %e, "admin copy failed"),
            }
        }
        Ok(records)
    }

    /// Tells `receiver` (and the admins) about a new chat message.
    ///
    /// # Errors
    ///
    /// Returns [`RelayError::Persistence`] if the receiver's notification
    /// cannot be stored.
    pub async fn new_message(
        &self,
        sender: &UserRecord,
        receiver: &UserRecord,
        message: &MessageRecord,
    ) -> Result<Vec<NotificationRecord>, RelayError> {
        let reference = ContentRef::Message(message.id);
        let mut records = vec![
            self.notify(
                NewNotification::new(
                    receiver.id,
                    NotificationType::NewMessage,
                    "New message",
                    format!("You have a new message from {}", sender.name),
                )
                .about(reference),
            )
            .await?,
        ];

        let admin_copy = NewNotification::new(
            receiver.id,
            NotificationType::NewMessage,
            "New message on the platform",
            format!("{} sent a message to {}", sender.name, receiver.name),
        )
        .about(reference);
        records.extend(self.admin_copies(&admin_copy, receiver.id).await);
        Ok(records)
    }

    /// Tells `receiver` (and the admins) that `sender` opened a chat.
    ///
    /// # Errors
    ///
    /// Returns [`RelayError::Persistence`] if the receiver's notification
    /// cannot be stored.
    pub async fn new_chat(
        &self,
        sender: &UserRecord,
        receiver: &UserRecord,
        chat: &ChatRecord,
    ) -> Result<Vec<NotificationRecord>, RelayError> {
        let reference = ContentRef::Chat(chat.id);
        let mut records = vec![
            self.notify(
                NewNotification::new(
                    receiver.id,
                    NotificationType::NewChat,
                    "New chat",
                    format!("{} started a conversation with you", sender.name),
                )
                .about(reference),
            )
            .await?,
        ];

        let admin_copy = NewNotification::new(
            receiver.id,
            NotificationType::NewChat,
            "New chat on the platform",
            format!("{} started a chat with {}", sender.name, receiver.name),
        )
        .about(reference);
        records.extend(self.admin_copies(&admin_copy, receiver.id).await);
        Ok(records)
    }

    /// Tells a complaint's owner its status changed. The owner's copy is
    /// important; admin copies are not.
    ///
    /// # Errors
    ///
    /// Returns [`RelayError::NotFound`] for an unknown owner and
    /// [`RelayError::Persistence`] if the owner's notification cannot be
    /// stored.
    pub async fn complaint_status_changed(
        &self,
        complaint_id: ComplaintId,
        owner_id: UserId,
        old_status: &str,
        new_status: &str,
    ) -> Result<Vec<NotificationRecord>, RelayError> {
        let owner = self.user(owner_id).await?;
        let reference = ContentRef::Complaint(complaint_id);

        let mut records = vec![
            self.notify(
                NewNotification::new(
                    owner.id,
                    NotificationType::ComplaintStatus,
                    "Complaint status updated",
                    format!("Your complaint changed from {old_status} to {new_status}"),
                )
                .important(true)
                .about(reference),
            )
            .await?,
        ];

        let admin_copy = NewNotification::new(
            owner.id,
            NotificationType::ComplaintStatus,
            "Complaint status updated",
            format!("Complaint from {} is now {new_status}", owner.name),
        )
        .about(reference);
        records.extend(self.admin_copies(&admin_copy, owner.id).await);

        tracing::info!(%complaint_id, owner_id = %owner.id, new_status, "complaint status changed");
        Ok(records)
    }

    /// Tells a plumber a client requested a service. The plumber's copy is
    /// important; admin copies are not.
    ///
    /// # Errors
    ///
    /// Returns [`RelayError::NotFound`] for an unknown client or plumber and
    /// [`RelayError::Persistence`] if the plumber's notification cannot be
    /// stored.
    pub async fn service_requested(
        &self,
        service_id: ServiceId,
        client_id: UserId,
        plumber_id: UserId,
    ) -> Result<Vec<NotificationRecord>, RelayError> {
        let client = self.user(client_id).await?;
        let plumber = self.user(plumber_id).await?;
        let reference = ContentRef::Service(service_id);

        let mut records = vec![
            self.notify(
                NewNotification::new(
                    plumber.id,
                    NotificationType::ServiceUpdate,
                    "New service request",
                    format!("{} requested a service from you", client.name),
                )
                .important(true)
                .about(reference),
            )
            .await?,
        ];

        let admin_copy = NewNotification::new(
            plumber.id,
            NotificationType::ServiceUpdate,
            "New service request on the platform",
            format!("{} requested a service from {}", client.name, plumber.name),
        )
        .about(reference);
        records.extend(self.admin_copies(&admin_copy, plumber.id).await);

        tracing::info!(%service_id, client_id = %client.id, plumber_id = %plumber.id, "service requested");
        Ok(records)
    }

    /// Tells a plumber their service was reviewed, with the rating.
    ///
    /// # Errors
    ///
    /// Returns [`RelayError::InvalidRequest`] for a rating outside 1..=5,
    /// [`RelayError::NotFound`] for an unknown reviewer or plumber and
    /// [`RelayError::Persistence`] if the plumber's notification cannot be
    /// stored.
    pub async fn service_reviewed(
        &self,
        service_id: ServiceId,
        reviewer_id: UserId,
        plumber_id: UserId,
        rating: u8,
    ) -> Result<Vec<NotificationRecord>, RelayError> {
        if !(1..=5).contains(&rating) {
            return Err(RelayError::InvalidRequest(format!(
                "rating must be between 1 and 5, got {rating}"
            )));
        }
        let reviewer = self.user(reviewer_id).await?;
        let plumber = self.user(plumber_id).await?;
        let reference = ContentRef::Service(service_id);

        let mut records = vec![
            self.notify(
                NewNotification::new(
                    plumber.id,
                    NotificationType::ServiceUpdate,
                    "New review",
                    format!("{} rated you {rating} stars", reviewer.name),
                )
                .about(reference),
            )
            .await?,
        ];

        let admin_copy = NewNotification::new(
            plumber.id,
            NotificationType::ServiceUpdate,
            "New review on the platform",
            format!("{} rated {} {rating} stars", reviewer.name, plumber.name),
        )
        .about(reference);
        records.extend(self.admin_copies(&admin_copy, plumber.id).await);
        Ok(records)
    }

    /// Tells the admins a complaint was filed. Only admins are notified,
    /// whatever the admin-copy setting, and every copy is important.
    ///
    /// # Errors
    ///
    /// Returns [`RelayError::NotFound`] for an unknown owner and
    /// [`RelayError::Persistence`] if the admin list cannot be read.
    pub async fn complaint_filed(
        &self,
        complaint_id: ComplaintId,
        owner_id: UserId,
        complaint_type: &str,
    ) -> Result<Vec<NotificationRecord>, RelayError> {
        let owner = self.user(owner_id).await?;
        let draft = NewNotification::new(
            owner.id,
            NotificationType::ComplaintStatus,
            "New complaint",
            format!("{} filed a complaint: {complaint_type}", owner.name),
        )
        .important(true)
        .about(ContentRef::Complaint(complaint_id));

        let records = self.copy_to_admins(&draft, None).await?;
        tracing::info!(%complaint_id, owner_id = %owner.id, admins = records.len(), "complaint filed");
        Ok(records)
    }

    async fn user(&self, id: UserId) -> Result<UserRecord, RelayError> {
        self.users
            .get_user(id)
            .await?
            .ok_or_else(|| RelayError::not_found("user", id))
    }

    async fn admin_copies(&self, draft: &NewNotification, skip: UserId) -> Vec<NotificationRecord> {
        self.notify_admins(draft, Some(skip))
            .await
            .unwrap_or_else(|e| {
                tracing::warn!(error = %e, "could not load admins for copies");
                Vec::new()
            })
    }

    /// The caller's notifications, newest first.
    ///
    /// # Errors
    ///
    /// Returns [`RelayError::Persistence`] on backend failure.
    pub async fn list(
        &self,
        user_id: UserId,
        filter: NotificationFilter,
    ) -> Result<Vec<NotificationRecord>, RelayError> {
        self.store.list_notifications(user_id, filter).await
    }

    /// One page of the caller's notifications, newest first.
    ///
    /// # Errors
    ///
    /// Returns [`RelayError::Persistence`] on backend failure.
    pub async fn page(
        &self,
        user_id: UserId,
        filter: NotificationFilter,
        page: PageRequest,
    ) -> Result<NotificationPage, RelayError> {
        self.store.page_notifications(user_id, filter, page).await
    }

    /// Marks one of the caller's notifications read and returns it.
    ///
    /// Reading twice is harmless: `read_at` keeps its first value.
    ///
    /// # Errors
    ///
    /// Returns [`RelayError::NotFound`] if the notification does not exist
    /// or belongs to another user.
    pub async fn mark_read(
        &self,
        user_id: UserId,
        id: NotificationId,
    ) -> Result<NotificationRecord, RelayError> {
        self.store
            .mark_notification_read(user_id, id)
            .await?
            .ok_or_else(|| RelayError::not_found("notification", id))
    }

    /// Marks everything read; returns how many notifications changed.
    ///
    /// # Errors
    ///
    /// Returns [`RelayError::Persistence`] on backend failure.
    pub async fn mark_all_read(&self, user_id: UserId) -> Result<u64, RelayError> {
        let updated = self.store.mark_all_notifications_read(user_id).await?;
        tracing::debug!(%user_id, updated, "marked all notifications read");
        Ok(updated)
    }

    /// Deletes one of the caller's notifications.
    ///
    /// # Errors
    ///
    /// Returns [`RelayError::NotFound`] if the notification does not exist
    /// or belongs to another user.
    pub async fn delete(&self, user_id: UserId, id: NotificationId) -> Result<(), RelayError> {
        if !self.store.delete_notification(user_id, id).await? {
            return Err(RelayError::not_found("notification", id));
        }
        tracing::debug!(%user_id, notification_id = %id, "notification deleted");
        Ok(())
    }

    /// Counters for the caller.
    ///
    /// # Errors
    ///
    /// Returns [`RelayError::Persistence`] on backend failure.
    pub async fn stats(&self, user_id: UserId) -> Result<NotificationStats, RelayError> {
        self.store.notification_stats(user_id).await
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use tokio::sync::mpsc;

    use super::*;
    use crate::domain::{ConnectionHandle, ConnectionId, Frame, Role, SessionRegistry};
    use crate::store::MemoryStore;

    struct Fixture {
        store: Arc<MemoryStore>,
        registry: Arc<SessionRegistry>,
        service: NotificationService,
    }

    async fn fixture() -> Fixture {
        let store = Arc::new(MemoryStore::new());
        store.seed_user(UserRecord::new(UserId::new(1), "Amal", Role::Client)).await;
        store.seed_user(UserRecord::new(UserId::new(2), "Basel", Role::Plumber)).await;
        store.seed_user(UserRecord::new(UserId::new(9), "Root", Role::Admin)).await;
        let registry = Arc::new(SessionRegistry::new());
        let dispatcher = Arc::new(FanoutDispatcher::new(Arc::clone(&registry)));
        let service = NotificationService::new(
            Arc::clone(&store) as Arc<dyn NotificationStore>,
            Arc::clone(&store) as Arc<dyn UserStore>,
            dispatcher,
        );
        Fixture {
            store,
            registry,
            service,
        }
    }

    async fn connect(registry: &SessionRegistry, user: i64) -> mpsc::Receiver<Frame> {
        let (tx, rx) = mpsc::channel(8);
        let handle = ConnectionHandle::new(ConnectionId::new(), UserId::new(user), tx);
        registry.join(GroupKey::user(UserId::new(user)), handle).await;
        rx
    }

    fn system(user: i64) -> NewNotification {
        NewNotification::new(UserId::new(user), NotificationType::System, "Hi", "Welcome")
    }

    #[tokio::test]
    async fn notify_pushes_to_personal_group() {
        let fx = fixture().await;
        let mut rx = connect(&fx.registry, 1).await;

        let Ok(record) = fx.service.notify(system(1)).await else {
            panic!("notify failed");
        };
        let Ok(frame) = rx.try_recv() else {
            panic!("expected a push");
        };
        let value: serde_json::Value =
            serde_json::from_str(frame.as_str()).unwrap_or_else(|e| panic!("{e}"));
        assert_eq!(value["type"], "notification_message");
        assert_eq!(value["notification"]["id"], record.id.get());
    }

    #[tokio::test]
    async fn offline_recipient_still_gets_the_row() {
        let fx = fixture().await;
        let Ok(record) = fx.service.notify(system(1)).await else {
            panic!("notify failed");
        };
        let listed = fx
            .service
            .list(UserId::new(1), NotificationFilter::default())
            .await
            .unwrap_or_default();
        assert_eq!(listed.first().map(|n| n.id), Some(record.id));
    }

    #[tokio::test]
    async fn failed_insert_pushes_nothing() {
        let fx = fixture().await;
        let mut rx = connect(&fx.registry, 1).await;
        fx.store.set_unavailable(true);

        assert!(fx.service.notify(system(1)).await.is_err());
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn new_message_copies_admins() {
        let fx = fixture().await;
        let message = MessageRecord {
            id: crate::domain::MessageId::new(5),
            chat_id: crate::domain::ChatId::new(42),
            sender_id: UserId::new(2),
            content: "hello".to_string(),
            message_type: crate::domain::MessageType::Text,
            is_read: false,
            created_at: chrono::Utc::now(),
        };
        let sender = UserRecord::new(UserId::new(2), "Basel", Role::Plumber);
        let receiver = UserRecord::new(UserId::new(1), "Amal", Role::Client);

        let Ok(records) = fx.service.new_message(&sender, &receiver, &message).await else {
            panic!("new_message failed");
        };
        let recipients: Vec<UserId> = records.iter().map(|r| r.user_id).collect();
        assert_eq!(recipients, vec![UserId::new(1), UserId::new(9)]);
        assert!(records.iter().all(|r| r.resolved_action_url().as_deref() == Some("/chat")));
    }

    #[tokio::test]
    async fn admin_copies_can_be_disabled() {
        let fx = fixture().await;
        let service = fx.service.clone().with_admin_copies(false);
        let Ok(copies) = service.notify_admins(&system(1), None).await else {
            panic!("notify_admins failed");
        };
        assert!(copies.is_empty());
    }

    #[tokio::test]
    async fn complaint_status_is_important_for_owner() {
        let fx = fixture().await;
        let Ok(records) = fx
            .service
            .complaint_status_changed(ComplaintId::new(3), UserId::new(1), "pending", "resolved")
            .await
        else {
            panic!("complaint_status_changed failed");
        };
        let Some(owner_copy) = records.first() else {
            panic!("expected the owner's notification");
        };
        assert!(owner_copy.is_important);
        assert_eq!(owner_copy.resolved_action_url().as_deref(), Some("/complaints/3"));
        assert!(records.iter().skip(1).all(|r| !r.is_important));
    }

    #[tokio::test]
    async fn service_request_is_important_for_plumber() {
        let fx = fixture().await;
        let mut plumber_rx = connect(&fx.registry, 2).await;

        let Ok(records) = fx
            .service
            .service_requested(ServiceId::new(11), UserId::new(1), UserId::new(2))
            .await
        else {
            panic!("service_requested failed");
        };
        let recipients: Vec<UserId> = records.iter().map(|r| r.user_id).collect();
        assert_eq!(recipients, vec![UserId::new(2), UserId::new(9)]);
        let Some(plumber_copy) = records.first() else {
            panic!("expected the plumber's notification");
        };
        assert!(plumber_copy.is_important);
        assert_eq!(plumber_copy.notification_type, NotificationType::ServiceUpdate);
        assert_eq!(plumber_copy.resolved_action_url().as_deref(), Some("/services/11"));
        assert!(records.iter().skip(1).all(|r| !r.is_important));
        assert!(plumber_rx.try_recv().is_ok());
    }

    #[tokio::test]
    async fn service_review_carries_rating() {
        let fx = fixture().await;
        let Ok(records) = fx
            .service
            .service_reviewed(ServiceId::new(11), UserId::new(1), UserId::new(2), 4)
            .await
        else {
            panic!("service_reviewed failed");
        };
        let Some(plumber_copy) = records.first() else {
            panic!("expected the plumber's notification");
        };
        assert_eq!(plumber_copy.user_id, UserId::new(2));
        assert!(plumber_copy.content.contains("4 stars"));
        assert_eq!(records.len(), 2);

        let out_of_range = fx
            .service
            .service_reviewed(ServiceId::new(11), UserId::new(1), UserId::new(2), 6)
            .await;
        assert!(matches!(out_of_range, Err(RelayError::InvalidRequest(_))));
    }

    #[tokio::test]
    async fn filed_complaint_reaches_admins_only() {
        let fx = fixture().await;
        let service = fx.service.clone().with_admin_copies(false);
        let Ok(records) = service
            .complaint_filed(ComplaintId::new(3), UserId::new(1), "late arrival")
            .await
        else {
            panic!("complaint_filed failed");
        };
        let recipients: Vec<UserId> = records.iter().map(|r| r.user_id).collect();
        assert_eq!(recipients, vec![UserId::new(9)]);
        assert!(records.iter().all(|r| r.is_important
            && r.notification_type == NotificationType::ComplaintStatus
            && r.resolved_action_url().as_deref() == Some("/complaints/3")));

        let owner_rows = fx
            .service
            .list(UserId::new(1), NotificationFilter::default())
            .await
            .unwrap_or_default();
        assert!(owner_rows.is_empty());
    }

    #[tokio::test]
    async fn delete_is_scoped_to_owner() {
        let fx = fixture().await;
        let Ok(record) = fx.service.notify(system(1)).await else {
            panic!("notify failed");
        };
        let foreign = fx.service.delete(UserId::new(2), record.id).await;
        assert!(matches!(foreign, Err(RelayError::NotFound { .. })));

        tokio_test::assert_ok!(fx.service.delete(UserId::new(1), record.id).await);
        let again = fx.service.delete(UserId::new(1), record.id).await;
        assert!(matches!(again, Err(RelayError::NotFound { .. })));
    }

    #[tokio::test]
    async fn mark_read_of_foreign_notification_is_not_found() {
        let fx = fixture().await;
        let Ok(record) = fx.service.notify(system(1)).await else {
            panic!("notify failed");
        };
        let result = fx.service.mark_read(UserId::new(2), record.id).await;
        assert!(matches!(result, Err(RelayError::NotFound { .. })));

        let Ok(read) = fx.service.mark_read(UserId::new(1), record.id).await else {
            panic!("mark_read failed");
        };
        assert!(read.is_read);
        let Ok(stats) = fx.service.stats(UserId::new(1)).await else {
            panic!("stats failed");
        };
        assert_eq!(stats.total_notifications, 1);
        assert_eq!(stats.unread_notifications, 0);
    }
}
