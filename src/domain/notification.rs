//! Durable per-user notification records.
//!
//! A [`NotificationRecord`] is written by a write path before any push is
//! attempted; the record is the source of truth and the push is only a
//! hint that it exists.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::{ChatId, ComplaintId, MessageId, NotificationId, ServiceId, UserId};
use crate::error::RelayError;

/// Category of a notification.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize, ToSchema,
)]
#[serde(rename_all = "snake_case")]
pub enum NotificationType {
    /// A message arrived in one of the user's chats.
    NewMessage,
    /// Someone opened a chat with the user.
    NewChat,
    /// A complaint the user filed changed status.
    ComplaintStatus,
    /// The user is asked to review a completed service.
    ReviewRequest,
    /// Platform announcement.
    #[default]
    System,
    /// A service request or review touched the user's services.
    ServiceUpdate,
}

impl NotificationType {
    /// Every variant, in declaration order.
    pub const ALL: [Self; 6] = [
        Self::NewMessage,
        Self::NewChat,
        Self::ComplaintStatus,
        Self::ReviewRequest,
        Self::System,
        Self::ServiceUpdate,
    ];

    /// Returns the type as stored in the database and sent on the wire.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::NewMessage => "new_message",
            Self::NewChat => "new_chat",
            Self::ComplaintStatus => "complaint_status",
            Self::ReviewRequest => "review_request",
            Self::System => "system",
            Self::ServiceUpdate => "service_update",
        }
    }
}

impl fmt::Display for NotificationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for NotificationType {
    type Err = RelayError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| RelayError::InvalidRequest(format!("unknown notification type: {s}")))
    }
}

/// Reference to the entity a notification is about.
///
/// Stored as a `(content_type, object_id)` pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "content_type", content = "object_id", rename_all = "snake_case")]
pub enum ContentRef {
    /// A chat message.
    Message(MessageId),
    /// A complaint.
    Complaint(ComplaintId),
    /// A chat.
    Chat(ChatId),
    /// Another notification.
    Notification(NotificationId),
    /// A service request, or the review left on it.
    Service(ServiceId),
}

impl ContentRef {
    /// Client route that renders the referenced entity.
    #[must_use]
    pub fn action_url(&self) -> String {
        match self {
            Self::Message(_) => "/chat".to_string(),
            Self::Chat(id) => format!("/chat/{id}"),
            Self::Complaint(id) => format!("/complaints/{id}"),
            Self::Notification(id) => format!("/notifications/{id}"),
            Self::Service(id) => format!("/services/{id}"),
        }
    }

    /// The `content_type` column value.
    #[must_use]
    pub const fn content_type(&self) -> &'static str {
        match self {
            Self::Message(_) => "message",
            Self::Complaint(_) => "complaint",
            Self::Chat(_) => "chat",
            Self::Notification(_) => "notification",
            Self::Service(_) => "service",
        }
    }

    /// The `object_id` column value.
    #[must_use]
    pub const fn object_id(&self) -> i64 {
        match self {
            Self::Message(id) => id.get(),
            Self::Complaint(id) => id.get(),
            Self::Chat(id) => id.get(),
            Self::Notification(id) => id.get(),
            Self::Service(id) => id.get(),
        }
    }

    /// Rebuilds a reference from its stored columns.
    ///
    /// Returns `None` when either column is missing or the content type is
    /// unknown, which the store treats as "no reference".
    #[must_use]
    pub fn from_columns(content_type: Option<&str>, object_id: Option<i64>) -> Option<Self> {
        let id = object_id?;
        match content_type? {
            "message" => Some(Self::Message(MessageId::new(id))),
            "complaint" => Some(Self::Complaint(ComplaintId::new(id))),
            "chat" => Some(Self::Chat(ChatId::new(id))),
            "notification" => Some(Self::Notification(NotificationId::new(id))),
            "service" => Some(Self::Service(ServiceId::new(id))),
            _ => None,
        }
    }
}

/// A persisted notification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NotificationRecord {
    /// Notification identifier.
    pub id: NotificationId,
    /// Recipient.
    pub user_id: UserId,
    /// Short headline.
    pub title: String,
    /// Body text.
    pub content: String,
    /// Category.
    pub notification_type: NotificationType,
    /// Read flag; only ever moves from `false` to `true`.
    pub is_read: bool,
    /// Highlighted in clients.
    pub is_important: bool,
    /// Explicit client route, overriding the one derived from `reference`.
    pub action_url: Option<String>,
    /// Originating entity.
    pub reference: Option<ContentRef>,
    /// Creation timestamp (immutable).
    pub created_at: DateTime<Utc>,
    /// Time of the first mark-as-read.
    pub read_at: Option<DateTime<Utc>>,
}

impl NotificationRecord {
    /// Marks the record read at `now`.
    ///
    /// Returns `true` if this call performed the transition. Calling it on
    /// an already-read record changes nothing.
    pub fn mark_read(&mut self, now: DateTime<Utc>) -> bool {
        if self.is_read {
            return false;
        }
        self.is_read = true;
        self.read_at = Some(now);
        true
    }

    /// Client route for this notification, if any.
    #[must_use]
    pub fn resolved_action_url(&self) -> Option<String> {
        self.action_url
            .clone()
            .or_else(|| self.reference.as_ref().map(ContentRef::action_url))
    }
}

/// A notification about to be written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewNotification {
    /// Recipient.
    pub user_id: UserId,
    /// Short headline.
    pub title: String,
    /// Body text.
    pub content: String,
    /// Category.
    pub notification_type: NotificationType,
    /// Highlighted in clients.
    pub is_important: bool,
    /// Explicit client route.
    pub action_url: Option<String>,
    /// Originating entity.
    pub reference: Option<ContentRef>,
}

impl NewNotification {
    /// Starts a draft with the given recipient and text.
    #[must_use]
    pub fn new(
        user_id: UserId,
        notification_type: NotificationType,
        title: impl Into<String>,
        content: impl Into<String>,
    ) -> Self {
        Self {
            user_id,
            title: title.into(),
            content: content.into(),
            notification_type,
            is_important: false,
            action_url: None,
            reference: None,
        }
    }

    /// Marks the draft important.
    #[must_use]
    pub fn important(mut self, is_important: bool) -> Self {
        self.is_important = is_important;
        self
    }

    /// Attaches an originating entity.
    #[must_use]
    pub fn about(mut self, reference: ContentRef) -> Self {
        self.reference = Some(reference);
        self
    }

    /// Sets an explicit client route.
    #[must_use]
    pub fn with_action_url(mut self, url: impl Into<String>) -> Self {
        self.action_url = Some(url.into());
        self
    }

    /// Same draft addressed to a different user.
    #[must_use]
    pub fn readdressed(&self, user_id: UserId) -> Self {
        Self {
            user_id,
            ..self.clone()
        }
    }
}

/// Filters for listing a user's notifications. `None` matches anything.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
pub struct NotificationFilter {
    /// Match on read state.
    pub is_read: Option<bool>,
    /// Match on category.
    pub notification_type: Option<NotificationType>,
    /// Match on importance.
    pub is_important: Option<bool>,
}

impl NotificationFilter {
    /// Returns `true` if `record` passes every set filter.
    #[must_use]
    pub fn matches(&self, record: &NotificationRecord) -> bool {
        self.is_read.is_none_or(|v| record.is_read == v)
            && self
                .notification_type
                .is_none_or(|t| record.notification_type == t)
            && self.is_important.is_none_or(|v| record.is_important == v)
    }
}

/// A window into a newest-first listing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    /// Rows to skip.
    pub offset: u64,
    /// Maximum rows to return.
    pub limit: u64,
}

/// One page of a user's notifications plus the size of the whole listing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NotificationPage {
    /// Records on this page, newest first.
    pub records: Vec<NotificationRecord>,
    /// Records matching the filter across all pages.
    pub total: u64,
}

/// Per-user notification counters.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, ToSchema)]
pub struct NotificationStats {
    /// All notifications of the user.
    pub total_notifications: u64,
    /// Not yet read.
    pub unread_notifications: u64,
    /// Important and not yet read.
    pub important_notifications: u64,
    /// Count per category; every category is present.
    pub notifications_by_type: BTreeMap<NotificationType, u64>,
}

impl NotificationStats {
    /// All counters at zero, with every category present.
    #[must_use]
    pub fn zeroed() -> Self {
        Self {
            notifications_by_type: NotificationType::ALL.into_iter().map(|t| (t, 0)).collect(),
            ..Self::default()
        }
    }

    /// Folds records into counters.
    #[must_use]
    pub fn from_records<'a>(records: impl IntoIterator<Item = &'a NotificationRecord>) -> Self {
        let mut stats = Self::zeroed();
        for record in records {
            stats.total_notifications += 1;
            if !record.is_read {
                stats.unread_notifications += 1;
                if record.is_important {
                    stats.important_notifications += 1;
                }
            }
            *stats
                .notifications_by_type
                .entry(record.notification_type)
                .or_insert(0) += 1;
        }
        stats
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;

    fn record() -> NotificationRecord {
        NotificationRecord {
            id: NotificationId::new(1),
            user_id: UserId::new(1),
            title: "t".to_string(),
            content: "c".to_string(),
            notification_type: NotificationType::NewMessage,
            is_read: false,
            is_important: false,
            action_url: None,
            reference: None,
            created_at: Utc::now(),
            read_at: None,
        }
    }

    #[test]
    fn mark_read_transitions_once() {
        let mut rec = record();
        let first = Utc::now();
        assert!(rec.mark_read(first));
        assert_eq!(rec.read_at, Some(first));

        let later = first + chrono::Duration::seconds(10);
        assert!(!rec.mark_read(later));
        assert_eq!(rec.read_at, Some(first));
        assert!(rec.is_read);
    }

    #[test]
    fn explicit_action_url_wins_over_reference() {
        let mut rec = record();
        rec.reference = Some(ContentRef::Chat(ChatId::new(42)));
        assert_eq!(rec.resolved_action_url().as_deref(), Some("/chat/42"));

        rec.action_url = Some("/custom".to_string());
        assert_eq!(rec.resolved_action_url().as_deref(), Some("/custom"));
    }

    #[test]
    fn content_ref_columns_round_trip() {
        let refs = [
            ContentRef::Message(MessageId::new(1)),
            ContentRef::Complaint(ComplaintId::new(2)),
            ContentRef::Chat(ChatId::new(3)),
            ContentRef::Notification(NotificationId::new(4)),
            ContentRef::Service(ServiceId::new(5)),
        ];
        for r in refs {
            let back = ContentRef::from_columns(Some(r.content_type()), Some(r.object_id()));
            assert_eq!(back, Some(r));
        }
        assert_eq!(ContentRef::from_columns(Some("article"), Some(1)), None);
        assert_eq!(ContentRef::from_columns(None, Some(1)), None);
    }

    #[test]
    fn type_parses_from_wire_name() {
        let Ok(t) = "complaint_status".parse::<NotificationType>() else {
            panic!("expected known type");
        };
        assert_eq!(t, NotificationType::ComplaintStatus);
        assert!("bogus".parse::<NotificationType>().is_err());
    }

    #[test]
    fn filter_matches_all_set_fields() {
        let rec = record();
        assert!(NotificationFilter::default().matches(&rec));
        let unread = NotificationFilter {
            is_read: Some(false),
            notification_type: Some(NotificationType::NewMessage),
            is_important: None,
        };
        assert!(unread.matches(&rec));
        let important = NotificationFilter {
            is_important: Some(true),
            ..NotificationFilter::default()
        };
        assert!(!important.matches(&rec));
    }

    #[test]
    fn stats_count_unread_important() {
        let mut a = record();
        a.is_important = true;
        let mut b = record();
        b.notification_type = NotificationType::System;
        b.is_read = true;
        let stats = NotificationStats::from_records([&a, &b]);
        assert_eq!(stats.total_notifications, 2);
        assert_eq!(stats.unread_notifications, 1);
        assert_eq!(stats.important_notifications, 1);
        assert_eq!(
            stats.notifications_by_type.get(&NotificationType::System),
            Some(&1)
        );
        assert_eq!(
            stats.notifications_by_type.get(&NotificationType::NewChat),
            Some(&0)
        );
    }
}
