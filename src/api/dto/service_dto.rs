//! Service request and review hook DTOs.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::domain::{NotificationPayload, ServiceId, UserId};

/// Request body for `POST /services/{id}/requested`. The caller is the
/// client who sent the request.
#[derive(Debug, Deserialize, ToSchema)]
pub struct ServiceRequestedRequest {
    /// Plumber the service was requested from.
    pub plumber_id: UserId,
}

/// Request body for `POST /services/{id}/reviewed`. The caller is the
/// reviewer.
#[derive(Debug, Deserialize, ToSchema)]
pub struct ServiceReviewedRequest {
    /// Plumber who performed the service.
    pub plumber_id: UserId,
    /// Stars, 1 to 5.
    pub rating: u8,
}

/// Response body for the service hooks.
#[derive(Debug, Serialize, ToSchema)]
pub struct ServiceNotificationsResponse {
    /// The service request.
    pub service_id: ServiceId,
    /// Notifications written (plumber first, then admin copies).
    pub notifications: Vec<NotificationPayload>,
}
