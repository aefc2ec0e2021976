//! Notification handlers: list, get (marks read), delete, mark-all, stats,
//! create.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};

use crate::api::dto::{
    CreateNotificationRequest, MarkAllReadResponse, NotificationListParams,
    NotificationListResponse,
};
use crate::api::extract::AuthUser;
use crate::app_state::AppState;
use crate::domain::{
    NewNotification, NotificationId, NotificationPayload, NotificationStats, Role,
};
use crate::error::{ErrorResponse, RelayError};

/// `GET /notifications` — The caller's notifications, newest first.
///
/// # Errors
///
/// Returns [`RelayError`] on auth or storage failure.
#[utoipa::path(
    get,
    path = "/api/v1/notifications",
    tag = "Notifications",
    summary = "List notifications",
    description = "Returns the caller's notifications newest first, optionally filtered by read state, category and importance. This is how clients catch up on pushes they missed while offline.",
    params(NotificationListParams),
    responses(
        (status = 200, description = "Paginated notification list", body = NotificationListResponse),
        (status = 401, description = "Missing or invalid token", body = ErrorResponse),
    )
)]
pub async fn list_notifications(
    State(state): State<AppState>,
    caller: AuthUser,
    Query(params): Query<NotificationListParams>,
) -> Result<impl IntoResponse, RelayError> {
    let pagination = params.pagination();
    let page = state
        .notification_service
        .page(caller.user_id(), params.filter(), pagination.page_request())
        .await?;

    Ok(Json(NotificationListResponse {
        data: page.records.iter().map(NotificationPayload::from).collect(),
        pagination: pagination.meta(page.total),
    }))
}

/// `GET /notifications/{id}` — Fetch one notification and mark it read.
///
/// # Errors
///
/// Returns [`RelayError::NotFound`] if the notification is not the caller's.
#[utoipa::path(
    get,
    path = "/api/v1/notifications/{id}",
    tag = "Notifications",
    summary = "Get a notification",
    description = "Returns one of the caller's notifications and marks it read. Reading an already-read notification does not move `read_at`.",
    params(
        ("id" = i64, Path, description = "Notification id"),
    ),
    responses(
        (status = 200, description = "The notification, now read", body = NotificationPayload),
        (status = 401, description = "Missing or invalid token", body = ErrorResponse),
        (status = 404, description = "No such notification", body = ErrorResponse),
    )
)]
pub async fn get_notification(
    State(state): State<AppState>,
    caller: AuthUser,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, RelayError> {
    let record = state
        .notification_service
        .mark_read(caller.user_id(), NotificationId::new(id))
        .await?;
    Ok(Json(NotificationPayload::from(&record)))
}

/// `DELETE /notifications/{id}` — Dismiss one of the caller's notifications.
///
/// # Errors
///
/// Returns [`RelayError::NotFound`] if the notification is not the caller's.
#[utoipa::path(
    delete,
    path = "/api/v1/notifications/{id}",
    tag = "Notifications",
    summary = "Delete a notification",
    params(
        ("id" = i64, Path, description = "Notification id"),
    ),
    responses(
        (status = 204, description = "Notification deleted"),
        (status = 401, description = "Missing or invalid token", body = ErrorResponse),
        (status = 404, description = "No such notification", body = ErrorResponse),
    )
)]
pub async fn delete_notification(
    State(state): State<AppState>,
    caller: AuthUser,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, RelayError> {
    state
        .notification_service
        .delete(caller.user_id(), NotificationId::new(id))
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

/// `POST /notifications/mark-all-read` — Mark everything read.
///
/// # Errors
///
/// Returns [`RelayError`] on auth or storage failure.
#[utoipa::path(
    post,
    path = "/api/v1/notifications/mark-all-read",
    tag = "Notifications",
    summary = "Mark all notifications read",
    responses(
        (status = 200, description = "Number of notifications updated", body = MarkAllReadResponse),
        (status = 401, description = "Missing or invalid token", body = ErrorResponse),
    )
)]
pub async fn mark_all_read(
    State(state): State<AppState>,
    caller: AuthUser,
) -> Result<impl IntoResponse, RelayError> {
    let updated_count = state
        .notification_service
        .mark_all_read(caller.user_id())
        .await?;
    Ok(Json(MarkAllReadResponse {
        message: format!("{updated_count} notifications marked as read"),
        updated_count,
    }))
}

/// `GET /notifications/stats` — Counters for the caller.
///
/// # Errors
///
/// Returns [`RelayError`] on auth or storage failure.
#[utoipa::path(
    get,
    path = "/api/v1/notifications/stats",
    tag = "Notifications",
    summary = "Notification counters",
    description = "Total, unread and important-unread counts plus a count per category.",
    responses(
        (status = 200, description = "Counters", body = NotificationStats),
        (status = 401, description = "Missing or invalid token", body = ErrorResponse),
    )
)]
pub async fn notification_stats(
    State(state): State<AppState>,
    caller: AuthUser,
) -> Result<impl IntoResponse, RelayError> {
    let stats = state.notification_service.stats(caller.user_id()).await?;
    Ok(Json(stats))
}

/// `POST /notifications` — Send a notification to a user (admins only).
///
/// # Errors
///
/// Returns [`RelayError::Forbidden`] unless the caller is an admin.
#[utoipa::path(
    post,
    path = "/api/v1/notifications",
    tag = "Notifications",
    summary = "Create a notification",
    description = "Persists a notification for `user_id` and pushes it to their live connections.",
    request_body = CreateNotificationRequest,
    responses(
        (status = 201, description = "Notification stored", body = NotificationPayload),
        (status = 401, description = "Missing or invalid token", body = ErrorResponse),
        (status = 403, description = "Caller is not an admin", body = ErrorResponse),
        (status = 404, description = "Unknown recipient", body = ErrorResponse),
    )
)]
pub async fn create_notification(
    State(state): State<AppState>,
    caller: AuthUser,
    Json(req): Json<CreateNotificationRequest>,
) -> Result<impl IntoResponse, RelayError> {
    let is_admin = state
        .users
        .get_user(caller.user_id())
        .await?
        .is_some_and(|u| u.role == Role::Admin);
    if !is_admin {
        return Err(RelayError::Forbidden(
            "only admins may create notifications".to_string(),
        ));
    }
    if state.users.get_user(req.user_id).await?.is_none() {
        return Err(RelayError::not_found("user", req.user_id));
    }
    if req.title.trim().is_empty() {
        return Err(RelayError::InvalidRequest("title is required".to_string()));
    }

    let mut draft = NewNotification::new(req.user_id, req.notification_type, req.title, req.content)
        .important(req.is_important);
    if let Some(url) = req.action_url {
        draft = draft.with_action_url(url);
    }
    let record = state.notification_service.notify(draft).await?;
    Ok((StatusCode::CREATED, Json(NotificationPayload::from(&record))))
}

/// Notification routes, mounted under `/api/v1`.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route(
            "/notifications",
            get(list_notifications).post(create_notification),
        )
        .route("/notifications/mark-all-read", post(mark_all_read))
        .route("/notifications/stats", get(notification_stats))
        .route(
            "/notifications/{id}",
            get(get_notification).delete(delete_notification),
        )
}
