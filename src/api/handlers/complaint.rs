//! Complaint hooks: a complaint was filed, or its status changed.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::post;
use axum::{Json, Router};

use crate::api::dto::{
    ComplaintFiledRequest, ComplaintNotificationsResponse, ComplaintStatusRequest,
};
use crate::api::extract::AuthUser;
use crate::app_state::AppState;
use crate::domain::{ComplaintId, NotificationPayload, Role};
use crate::error::{ErrorResponse, RelayError};

/// `POST /complaints/{id}/filed` — Announce a new complaint to the admins.
///
/// # Errors
///
/// Returns [`RelayError`] on auth or storage failure.
#[utoipa::path(
    post,
    path = "/api/v1/complaints/{id}/filed",
    tag = "Complaints",
    summary = "Complaint filed",
    description = "Called after the caller filed a complaint. Every admin gets an important notification.",
    params(
        ("id" = i64, Path, description = "Complaint id"),
    ),
    request_body = ComplaintFiledRequest,
    responses(
        (status = 201, description = "Notifications written", body = ComplaintNotificationsResponse),
        (status = 401, description = "Missing or invalid token", body = ErrorResponse),
    )
)]
pub async fn complaint_filed(
    State(state): State<AppState>,
    caller: AuthUser,
    Path(id): Path<i64>,
    Json(req): Json<ComplaintFiledRequest>,
) -> Result<impl IntoResponse, RelayError> {
    let complaint_id = ComplaintId::new(id);
    let records = state
        .notification_service
        .complaint_filed(complaint_id, caller.user_id(), &req.complaint_type)
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(ComplaintNotificationsResponse {
            complaint_id,
            notifications: records.iter().map(NotificationPayload::from).collect(),
        }),
    ))
}

/// `POST /complaints/{id}/status` — Announce a complaint status change.
///
/// # Errors
///
/// Returns [`RelayError::Forbidden`] unless the caller is staff.
#[utoipa::path(
    post,
    path = "/api/v1/complaints/{id}/status",
    tag = "Complaints",
    summary = "Complaint status changed",
    description = "Called by the back office after a complaint's status changed. Notifies the owner (important) and copies the admins.",
    params(
        ("id" = i64, Path, description = "Complaint id"),
    ),
    request_body = ComplaintStatusRequest,
    responses(
        (status = 200, description = "Notifications written", body = ComplaintNotificationsResponse),
        (status = 401, description = "Missing or invalid token", body = ErrorResponse),
        (status = 403, description = "Caller is not staff", body = ErrorResponse),
        (status = 404, description = "Unknown owner", body = ErrorResponse),
    )
)]
pub async fn complaint_status_changed(
    State(state): State<AppState>,
    caller: AuthUser,
    Path(id): Path<i64>,
    Json(req): Json<ComplaintStatusRequest>,
) -> Result<impl IntoResponse, RelayError> {
    let is_staff = state
        .users
        .get_user(caller.user_id())
        .await?
        .is_some_and(|u| matches!(u.role, Role::Admin | Role::Moderator));
    if !is_staff {
        return Err(RelayError::Forbidden(
            "only staff may change complaint status".to_string(),
        ));
    }

    let complaint_id = ComplaintId::new(id);
    let records = state
        .notification_service
        .complaint_status_changed(complaint_id, req.owner_id, &req.old_status, &req.new_status)
        .await?;

    Ok(Json(ComplaintNotificationsResponse {
        complaint_id,
        notifications: records.iter().map(NotificationPayload::from).collect(),
    }))
}

/// Complaint routes, mounted under `/api/v1`.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/complaints/{id}/filed", post(complaint_filed))
        .route("/complaints/{id}/status", post(complaint_status_changed))
}
