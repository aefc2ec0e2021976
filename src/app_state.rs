//! Shared application state injected into all Axum handlers.

use std::sync::Arc;

use crate::auth::{Authenticator, JwtAuthenticator};
use crate::config::RelayConfig;
use crate::domain::{FanoutDispatcher, SessionRegistry};
use crate::service::{ChatService, NotificationService, PresenceService};
use crate::store::{ChatStore, NotificationStore, UserStore};

/// Shared application state available to all handlers via Axum's
/// `State` extractor.
#[derive(Debug, Clone)]
pub struct AppState {
    /// Live connection membership.
    pub registry: Arc<SessionRegistry>,
    /// Group fan-out.
    pub dispatcher: Arc<FanoutDispatcher>,
    /// Chat write path.
    pub chat_service: Arc<ChatService>,
    /// Notification write path and reads.
    pub notification_service: Arc<NotificationService>,
    /// Connection registration and presence.
    pub presence: Arc<PresenceService>,
    /// User lookups and presence.
    pub users: Arc<dyn UserStore>,
    /// Bearer token verification.
    pub authenticator: Arc<dyn Authenticator>,
    /// Capacity of each connection's outbound queue.
    pub outbound_queue_capacity: usize,
}

impl AppState {
    /// Wires registry, dispatcher, and services around one store that
    /// backs every table.
    #[must_use]
    pub fn new<S>(config: &RelayConfig, store: Arc<S>) -> Self
    where
        S: NotificationStore + ChatStore + UserStore + 'static,
    {
        let registry = Arc::new(SessionRegistry::new());
        let dispatcher = Arc::new(
            FanoutDispatcher::new(Arc::clone(&registry)).with_push_enabled(config.push_enabled),
        );
        let users: Arc<dyn UserStore> = Arc::clone(&store) as Arc<dyn UserStore>;

        let notification_service = Arc::new(
            NotificationService::new(
                Arc::clone(&store) as Arc<dyn NotificationStore>,
                Arc::clone(&users),
                Arc::clone(&dispatcher),
            )
            .with_admin_copies(config.notify_admins),
        );
        let chat_service = Arc::new(
            ChatService::new(
                store as Arc<dyn ChatStore>,
                Arc::clone(&users),
                Arc::clone(&dispatcher),
                Arc::clone(&notification_service),
            )
            .with_max_message_length(config.max_message_length),
        );

        let presence = Arc::new(PresenceService::new(
            Arc::clone(&dispatcher),
            Arc::clone(&users),
        ));

        Self {
            registry,
            dispatcher,
            chat_service,
            notification_service,
            presence,
            users,
            authenticator: Arc::new(JwtAuthenticator::new(
                &config.jwt_secret,
                config.jwt_leeway_secs,
            )),
            outbound_queue_capacity: config.outbound_queue_capacity.max(1),
        }
    }
}
