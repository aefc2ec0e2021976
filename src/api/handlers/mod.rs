//! REST endpoint handlers organized by resource.

pub mod chat;
pub mod complaint;
pub mod notification;
pub mod service;
pub mod system;

use axum::Router;

use crate::app_state::AppState;

/// Composes all resource routes under `/api/v1`.
pub fn routes() -> Router<AppState> {
    Router::new()
        .merge(notification::routes())
        .merge(chat::routes())
        .merge(complaint::routes())
        .merge(service::routes())
}
