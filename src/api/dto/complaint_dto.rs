//! Complaint hook DTOs.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::domain::{ComplaintId, NotificationPayload, UserId};

/// Request body for `POST /complaints/{id}/status`.
///
/// Sent by the back office after it changed a complaint; the relay only
/// turns it into notifications.
#[derive(Debug, Deserialize, ToSchema)]
pub struct ComplaintStatusRequest {
    /// User who filed the complaint.
    pub owner_id: UserId,
    /// Status before the change.
    pub old_status: String,
    /// Status after the change.
    pub new_status: String,
}

/// Request body for `POST /complaints/{id}/filed`. The caller is the owner.
#[derive(Debug, Deserialize, ToSchema)]
pub struct ComplaintFiledRequest {
    /// Category chosen by the owner, shown to the admins.
    pub complaint_type: String,
}

/// Response body for the complaint hooks.
#[derive(Debug, Serialize, ToSchema)]
pub struct ComplaintNotificationsResponse {
    /// The complaint.
    pub complaint_id: ComplaintId,
    /// Notifications written (owner first when there is one, then admin
    /// copies).
    pub notifications: Vec<NotificationPayload>,
}
