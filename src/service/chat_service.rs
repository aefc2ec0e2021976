//! Chat write path: open chats, send messages, read history.

use std::sync::Arc;

use crate::domain::{
    ChatId, ChatRecord, FanoutDispatcher, GroupKey, MessageRecord, MessageType, NewMessage,
    ServerEvent, UserId, UserRecord, validate_participants,
};
use crate::error::RelayError;
use crate::service::NotificationService;
use crate::store::{ChatStore, UserStore};

/// Default message length limit in characters.
pub const DEFAULT_MAX_MESSAGE_LENGTH: usize = 2000;

/// Orchestrates chat writes.
///
/// Sending a message is: check access → validate → insert → dispatch to
/// `chat_{id}` → notify the other participant. Nothing is dispatched
/// unless the insert succeeded.
#[derive(Debug, Clone)]
pub struct ChatService {
    chats: Arc<dyn ChatStore>,
    users: Arc<dyn UserStore>,
    dispatcher: Arc<FanoutDispatcher>,
    notifications: Arc<NotificationService>,
    max_message_length: usize,
}

impl ChatService {
    /// Creates a new `ChatService`.
    #[must_use]
    pub fn new(
        chats: Arc<dyn ChatStore>,
        users: Arc<dyn UserStore>,
        dispatcher: Arc<FanoutDispatcher>,
        notifications: Arc<NotificationService>,
    ) -> Self {
        Self {
            chats,
            users,
            dispatcher,
            notifications,
            max_message_length: DEFAULT_MAX_MESSAGE_LENGTH,
        }
    }

    /// Overrides the message length limit.
    #[must_use]
    pub fn with_max_message_length(mut self, max: usize) -> Self {
        self.max_message_length = max;
        self
    }

    async fn user(&self, id: UserId) -> Result<UserRecord, RelayError> {
        self.users
            .get_user(id)
            .await?
            .ok_or_else(|| RelayError::not_found("user", id))
    }

    /// Loads a chat on behalf of `user_id`.
    ///
    /// # Errors
    ///
    /// Returns [`RelayError::NotFound`] for an unknown chat and
    /// [`RelayError::Forbidden`] if `user_id` is not a participant.
    pub async fn chat_for_participant(
        &self,
        chat_id: ChatId,
        user_id: UserId,
    ) -> Result<ChatRecord, RelayError> {
        let chat = self
            .chats
            .get_chat(chat_id)
            .await?
            .ok_or_else(|| RelayError::not_found("chat", chat_id))?;
        if !chat.is_participant(user_id) {
            return Err(RelayError::Forbidden(format!(
                "user {user_id} is not a participant of chat {chat_id}"
            )));
        }
        Ok(chat)
    }

    /// Opens a chat between `initiator_id` and `recipient_id`, or returns
    /// the one they already share. The flag is `true` when a chat was
    /// created.
    ///
    /// # Errors
    ///
    /// Returns [`RelayError::NotFound`] for unknown users and
    /// [`RelayError::InvalidRequest`] unless the pair is one client and
    /// one plumber.
    pub async fn create_chat(
        &self,
        initiator_id: UserId,
        recipient_id: UserId,
    ) -> Result<(ChatRecord, bool), RelayError> {
        let initiator = self.user(initiator_id).await?;
        let recipient = self.user(recipient_id).await?;
        validate_participants(&initiator, &recipient)?;

        if let Some(existing) = self.chats.find_chat_between(initiator.id, recipient.id).await? {
            return Ok((existing, false));
        }

        let chat = self.chats.insert_chat(initiator.id, recipient.id).await?;
        tracing::info!(chat_id = %chat.id, %initiator_id, %recipient_id, "chat created");

        if let Err(e) = self.notifications.new_chat(&initiator, &recipient, &chat).await {
            tracing::warn!(chat_id = %chat.id, error = %e, "new chat notification failed");
        }
        Ok((chat, true))
    }

    /// Persists a message from `sender_id` and relays it to the chat room.
    ///
    /// # Errors
    ///
    /// - [`RelayError::NotFound`] for an unknown chat.
    /// - [`RelayError::Forbidden`] if the sender is not a participant.
    /// - [`RelayError::InvalidRequest`] for a closed chat or invalid content.
    /// - [`RelayError::Persistence`] if the insert fails.
    pub async fn send_message(
        &self,
        chat_id: ChatId,
        sender_id: UserId,
        content: &str,
        message_type: MessageType,
    ) -> Result<MessageRecord, RelayError> {
        let chat = self.chat_for_participant(chat_id, sender_id).await?;
        if !chat.is_active {
            return Err(RelayError::InvalidRequest(format!("chat {chat_id} is closed")));
        }
        let draft = NewMessage::new(
            chat_id,
            sender_id,
            content,
            message_type,
            self.max_message_length,
        )?;
        let sender = self.user(sender_id).await?;

        let message = self.chats.insert_message(draft).await?;
        let report = self
            .dispatcher
            .dispatch(GroupKey::chat(chat_id), &ServerEvent::chat_message(&message, &sender))
            .await;
        tracing::debug!(
            %chat_id,
            message_id = %message.id,
            %sender_id,
            delivered = report.delivered,
            "message relayed"
        );

        if let Some(receiver_id) = chat.counterpart(sender_id) {
            match self.user(receiver_id).await {
                Ok(receiver) => {
                    if let Err(e) = self
                        .notifications
                        .new_message(&sender, &receiver, &message)
                        .await
                    {
                        tracing::warn!(%chat_id, error = %e, "new message notification failed");
                    }
                }
                Err(e) => tracing::warn!(%chat_id, %receiver_id, error = %e, "receiver lookup failed"),
            }
        }
        Ok(message)
    }

    /// Messages of a chat in order, for participants only.
    ///
    /// # Errors
    ///
    /// Same access errors as [`ChatService::chat_for_participant`].
    pub async fn history(
        &self,
        chat_id: ChatId,
        user_id: UserId,
    ) -> Result<Vec<MessageRecord>, RelayError> {
        self.chat_for_participant(chat_id, user_id).await?;
        self.chats.list_messages(chat_id).await
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use chrono::Utc;
    use tokio::sync::mpsc;

    use super::*;
    use crate::domain::{
        ConnectionHandle, ConnectionId, Frame, NotificationFilter, Role, SessionRegistry,
    };
    use crate::store::{MemoryStore, NotificationStore};

    const CLIENT: UserId = UserId::new(1);
    const PLUMBER: UserId = UserId::new(2);
    const OTHER_CLIENT: UserId = UserId::new(3);
    const CHAT: ChatId = ChatId::new(42);

    struct Fixture {
        store: Arc<MemoryStore>,
        registry: Arc<SessionRegistry>,
        notifications: Arc<NotificationService>,
        service: ChatService,
    }

    async fn fixture() -> Fixture {
        let store = Arc::new(MemoryStore::new());
        store.seed_user(UserRecord::new(CLIENT, "Amal", Role::Client)).await;
        store.seed_user(UserRecord::new(PLUMBER, "Basel", Role::Plumber)).await;
        store.seed_user(UserRecord::new(OTHER_CLIENT, "Carim", Role::Client)).await;
        store
            .seed_chat(ChatRecord {
                id: CHAT,
                initiator_id: CLIENT,
                recipient_id: PLUMBER,
                is_active: true,
                created_at: Utc::now(),
            })
            .await;

        let registry = Arc::new(SessionRegistry::new());
        let dispatcher = Arc::new(FanoutDispatcher::new(Arc::clone(&registry)));
        let notifications = Arc::new(NotificationService::new(
            Arc::clone(&store) as Arc<dyn NotificationStore>,
            Arc::clone(&store) as Arc<dyn UserStore>,
            Arc::clone(&dispatcher),
        ));
        let service = ChatService::new(
            Arc::clone(&store) as Arc<dyn ChatStore>,
            Arc::clone(&store) as Arc<dyn UserStore>,
            dispatcher,
            Arc::clone(&notifications),
        );
        Fixture {
            store,
            registry,
            notifications,
            service,
        }
    }

    async fn join_chat(registry: &SessionRegistry, user: UserId) -> mpsc::Receiver<Frame> {
        let (tx, rx) = mpsc::channel(8);
        registry
            .join(GroupKey::chat(CHAT), ConnectionHandle::new(ConnectionId::new(), user, tx))
            .await;
        rx
    }

    fn content_of(frame: &Frame) -> String {
        let value: serde_json::Value =
            serde_json::from_str(frame.as_str()).unwrap_or_else(|e| panic!("{e}"));
        value["message"]["content"].as_str().unwrap_or_default().to_string()
    }

    #[tokio::test]
    async fn message_reaches_room_and_notifies_counterpart() {
        let fx = fixture().await;
        let mut rx = join_chat(&fx.registry, CLIENT).await;

        let Ok(message) = fx
            .service
            .send_message(CHAT, PLUMBER, "  hello ", MessageType::Text)
            .await
        else {
            panic!("send failed");
        };
        assert_eq!(message.content, "hello");

        let Ok(frame) = rx.try_recv() else {
            panic!("expected chat push");
        };
        assert_eq!(content_of(&frame), "hello");

        let inbox = fx
            .notifications
            .list(CLIENT, NotificationFilter::default())
            .await
            .unwrap_or_default();
        assert_eq!(inbox.len(), 1);
    }

    #[tokio::test]
    async fn ordered_messages_arrive_in_order() {
        let fx = fixture().await;
        let mut rx = join_chat(&fx.registry, CLIENT).await;

        for text in ["M1", "M2"] {
            let result = fx.service.send_message(CHAT, PLUMBER, text, MessageType::Text).await;
            assert!(result.is_ok());
        }
        let first = rx.try_recv().map(|f| content_of(&f)).unwrap_or_default();
        let second = rx.try_recv().map(|f| content_of(&f)).unwrap_or_default();
        assert_eq!((first.as_str(), second.as_str()), ("M1", "M2"));
    }

    #[tokio::test]
    async fn outsider_cannot_send() {
        let fx = fixture().await;
        let result = fx
            .service
            .send_message(CHAT, OTHER_CLIENT, "hi", MessageType::Text)
            .await;
        assert!(matches!(result, Err(RelayError::Forbidden(_))));

        let result = fx
            .service
            .send_message(ChatId::new(999), PLUMBER, "hi", MessageType::Text)
            .await;
        assert!(matches!(result, Err(RelayError::NotFound { .. })));
    }

    #[tokio::test]
    async fn storage_failure_relays_nothing() {
        let fx = fixture().await;
        let mut rx = join_chat(&fx.registry, CLIENT).await;
        fx.store.set_unavailable(true);

        let result = fx.service.send_message(CHAT, PLUMBER, "hi", MessageType::Text).await;
        assert!(matches!(result, Err(RelayError::Persistence(_))));
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn blank_and_oversized_messages_are_rejected() {
        let fx = fixture().await;
        let service = fx.service.clone().with_max_message_length(5);
        let blank = service.send_message(CHAT, PLUMBER, "   ", MessageType::Text).await;
        assert!(matches!(blank, Err(RelayError::InvalidRequest(_))));
        let long = service.send_message(CHAT, PLUMBER, "abcdef", MessageType::Text).await;
        assert!(matches!(long, Err(RelayError::InvalidRequest(_))));
    }

    #[tokio::test]
    async fn create_chat_reuses_existing_pair() {
        let fx = fixture().await;
        let Ok((chat, created)) = fx.service.create_chat(PLUMBER, CLIENT).await else {
            panic!("create_chat failed");
        };
        assert!(!created);
        assert_eq!(chat.id, CHAT);

        let same_role = fx.service.create_chat(CLIENT, OTHER_CLIENT).await;
        assert!(matches!(same_role, Err(RelayError::InvalidRequest(_))));
    }

    #[tokio::test]
    async fn create_chat_notifies_recipient() {
        let fx = fixture().await;
        let plumber = UserId::new(4);
        fx.store.seed_user(UserRecord::new(plumber, "Dana", Role::Plumber)).await;

        let Ok((chat, created)) = fx.service.create_chat(OTHER_CLIENT, plumber).await else {
            panic!("create_chat failed");
        };
        assert!(created);
        let inbox = fx
            .notifications
            .list(plumber, NotificationFilter::default())
            .await
            .unwrap_or_default();
        let Some(first) = inbox.first() else {
            panic!("expected a new_chat notification");
        };
        assert_eq!(first.resolved_action_url(), Some(format!("/chat/{}", chat.id)));
    }

    #[tokio::test]
    async fn history_is_participants_only() {
        let fx = fixture().await;
        let _ = fx.service.send_message(CHAT, CLIENT, "first", MessageType::Text).await;
        assert_eq!(fx.service.history(CHAT, PLUMBER).await.map(|m| m.len()).ok(), Some(1));
        assert!(fx.service.history(CHAT, OTHER_CLIENT).await.is_err());
    }
}
