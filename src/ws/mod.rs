//! WebSocket layer: handshake, connection loop, client frames.
//!
//! Two endpoints, `/ws/notifications` and `/ws/chat/{chat_id}`, differ only
//! in the groups the connection joins (see [`subscription::Scope`]).

pub mod connection;
pub mod handler;
pub mod messages;
pub mod subscription;

use axum::Router;
use axum::routing::get;

use crate::app_state::AppState;

/// Websocket routes mounted at the root level.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/ws/notifications", get(handler::notifications_ws))
        .route("/ws/chat/{chat_id}", get(handler::chat_ws))
}
