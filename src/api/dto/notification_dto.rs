//! Notification DTOs for list, mark-all and admin create.

use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

use super::common_dto::{PaginationMeta, PaginationParams};
use crate::domain::{NotificationFilter, NotificationPayload, NotificationType, UserId};

/// Query parameters for `GET /notifications`.
///
/// Kept flat because query strings cannot carry nested structures.
#[derive(Debug, Clone, Copy, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct NotificationListParams {
    /// Only read (`true`) or unread (`false`) notifications.
    pub is_read: Option<bool>,
    /// Only this category.
    #[param(value_type = Option<String>)]
    pub notification_type: Option<NotificationType>,
    /// Only important (`true`) or regular (`false`) notifications.
    pub is_important: Option<bool>,
    /// Page number (1-indexed).
    pub page: Option<u32>,
    /// Items per page (max 100).
    pub per_page: Option<u32>,
}

impl NotificationListParams {
    /// The filter part.
    #[must_use]
    pub fn filter(&self) -> NotificationFilter {
        NotificationFilter {
            is_read: self.is_read,
            notification_type: self.notification_type,
            is_important: self.is_important,
        }
    }

    /// The pagination part.
    #[must_use]
    pub fn pagination(&self) -> PaginationParams {
        let defaults = PaginationParams::default();
        PaginationParams {
            page: self.page.unwrap_or(defaults.page),
            per_page: self.per_page.unwrap_or(defaults.per_page),
        }
    }
}

/// Response body for `GET /notifications`.
#[derive(Debug, Serialize, ToSchema)]
pub struct NotificationListResponse {
    /// Notifications on this page, newest first.
    pub data: Vec<NotificationPayload>,
    /// Page description.
    pub pagination: PaginationMeta,
}

/// Response body for `POST /notifications/mark-all-read`.
#[derive(Debug, Serialize, ToSchema)]
pub struct MarkAllReadResponse {
    /// Human-readable summary.
    pub message: String,
    /// Notifications that changed from unread to read.
    pub updated_count: u64,
}

/// Request body for `POST /notifications` (admins only).
#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateNotificationRequest {
    /// Recipient.
    pub user_id: UserId,
    /// Short headline.
    pub title: String,
    /// Body text.
    pub content: String,
    /// Category. Defaults to `system`.
    #[serde(default)]
    pub notification_type: NotificationType,
    /// Highlighted in clients.
    #[serde(default)]
    pub is_important: bool,
    /// Client route to open.
    #[serde(default)]
    pub action_url: Option<String>,
}
