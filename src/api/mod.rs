//! REST API layer: route handlers, DTOs, and router composition.
//!
//! All resource endpoints are mounted under `/api/v1`; `/health` and the
//! websocket routes live at the root.

pub mod dto;
pub mod extract;
pub mod handlers;

use std::time::Duration;

use axum::Router;
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;
use utoipa::OpenApi;

use crate::app_state::AppState;

/// OpenAPI document for the REST surface.
#[derive(Debug, OpenApi)]
#[openapi(
    info(
        title = "plumb-relay",
        description = "Realtime notification and chat fan-out for the PlumbConnect marketplace."
    ),
    paths(
        handlers::notification::list_notifications,
        handlers::notification::get_notification,
        handlers::notification::delete_notification,
        handlers::notification::mark_all_read,
        handlers::notification::notification_stats,
        handlers::notification::create_notification,
        handlers::chat::create_chat,
        handlers::chat::list_messages,
        handlers::chat::send_message,
        handlers::complaint::complaint_filed,
        handlers::complaint::complaint_status_changed,
        handlers::service::service_requested,
        handlers::service::service_reviewed,
        handlers::system::health_handler,
    ),
    tags(
        (name = "Notifications", description = "Durable notifications and reconciliation reads"),
        (name = "Chats", description = "Chat write path and history"),
        (name = "Complaints", description = "Complaint hooks"),
        (name = "Services", description = "Service request and review hooks"),
        (name = "System", description = "Health"),
    )
)]
pub struct ApiDoc;

/// Upper bound for a REST request, fan-out included.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Builds the complete API router with all REST endpoints.
///
/// The timeout applies to REST only; websocket connections outlive it.
pub fn build_router() -> Router<AppState> {
    Router::new()
        .nest("/api/v1", handlers::routes())
        .merge(handlers::system::routes())
        .layer(TimeoutLayer::new(REQUEST_TIMEOUT))
}

/// Builds the whole HTTP application: REST, websocket, docs, and layers.
pub fn build_app(state: AppState) -> Router {
    let router = Router::new()
        .merge(build_router())
        .merge(crate::ws::routes());

    #[cfg(feature = "swagger-ui")]
    let router = router.merge(
        utoipa_swagger_ui::SwaggerUi::new("/swagger-ui")
            .url("/api-docs/openapi.json", ApiDoc::openapi()),
    );

    router
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CorsLayer::permissive()),
        )
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn openapi_lists_every_rest_route() {
        let doc = ApiDoc::openapi();
        for path in [
            "/api/v1/notifications",
            "/api/v1/notifications/{id}",
            "/api/v1/notifications/mark-all-read",
            "/api/v1/notifications/stats",
            "/api/v1/chats",
            "/api/v1/chats/{id}/messages",
            "/api/v1/complaints/{id}/filed",
            "/api/v1/complaints/{id}/status",
            "/api/v1/services/{id}/requested",
            "/api/v1/services/{id}/reviewed",
            "/health",
        ] {
            assert!(doc.paths.paths.contains_key(path), "missing {path}");
        }
    }
}
