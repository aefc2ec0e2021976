//! Service request hooks: a client requested a service, or reviewed one.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::post;
use axum::{Json, Router};

use crate::api::dto::{
    ServiceNotificationsResponse, ServiceRequestedRequest, ServiceReviewedRequest,
};
use crate::api::extract::AuthUser;
use crate::app_state::AppState;
use crate::domain::{NotificationPayload, NotificationRecord, ServiceId};
use crate::error::{ErrorResponse, RelayError};

fn created(
    service_id: ServiceId,
    records: &[NotificationRecord],
) -> (StatusCode, Json<ServiceNotificationsResponse>) {
    (
        StatusCode::CREATED,
        Json(ServiceNotificationsResponse {
            service_id,
            notifications: records.iter().map(NotificationPayload::from).collect(),
        }),
    )
}

/// `POST /services/{id}/requested` — Tell a plumber about a new request.
///
/// # Errors
///
/// Returns [`RelayError::NotFound`] for an unknown plumber.
#[utoipa::path(
    post,
    path = "/api/v1/services/{id}/requested",
    tag = "Services",
    summary = "Service requested",
    description = "Called after the caller requested a service. The plumber gets an important notification and the admins get copies.",
    params(
        ("id" = i64, Path, description = "Service request id"),
    ),
    request_body = ServiceRequestedRequest,
    responses(
        (status = 201, description = "Notifications written", body = ServiceNotificationsResponse),
        (status = 401, description = "Missing or invalid token", body = ErrorResponse),
        (status = 404, description = "Unknown plumber", body = ErrorResponse),
    )
)]
pub async fn service_requested(
    State(state): State<AppState>,
    caller: AuthUser,
    Path(id): Path<i64>,
    Json(req): Json<ServiceRequestedRequest>,
) -> Result<impl IntoResponse, RelayError> {
    let service_id = ServiceId::new(id);
    let records = state
        .notification_service
        .service_requested(service_id, caller.user_id(), req.plumber_id)
        .await?;
    Ok(created(service_id, &records))
}

/// `POST /services/{id}/reviewed` — Tell a plumber about a new review.
///
/// # Errors
///
/// Returns [`RelayError::InvalidRequest`] for a rating outside 1..=5.
#[utoipa::path(
    post,
    path = "/api/v1/services/{id}/reviewed",
    tag = "Services",
    summary = "Service reviewed",
    description = "Called after the caller reviewed a service. The plumber is told the rating and the admins get copies.",
    params(
        ("id" = i64, Path, description = "Service request id"),
    ),
    request_body = ServiceReviewedRequest,
    responses(
        (status = 201, description = "Notifications written", body = ServiceNotificationsResponse),
        (status = 400, description = "Rating out of range", body = ErrorResponse),
        (status = 401, description = "Missing or invalid token", body = ErrorResponse),
        (status = 404, description = "Unknown plumber", body = ErrorResponse),
    )
)]
pub async fn service_reviewed(
    State(state): State<AppState>,
    caller: AuthUser,
    Path(id): Path<i64>,
    Json(req): Json<ServiceReviewedRequest>,
) -> Result<impl IntoResponse, RelayError> {
    let service_id = ServiceId::new(id);
    let records = state
        .notification_service
        .service_reviewed(service_id, caller.user_id(), req.plumber_id, req.rating)
        .await?;
    Ok(created(service_id, &records))
}

/// Service routes, mounted under `/api/v1`.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/services/{id}/requested", post(service_requested))
        .route("/services/{id}/reviewed", post(service_reviewed))
}
