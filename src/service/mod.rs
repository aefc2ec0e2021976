//! Service layer: the write paths that feed the dispatcher.
//!
//! [`ChatService`] and [`NotificationService`] persist first, then hand the
//! stored record to the [`crate::domain::FanoutDispatcher`].
//! [`PresenceService`] registers connections and keeps `is_online` in step.

pub mod chat_service;
pub mod notification_service;
pub mod presence_service;

pub use chat_service::ChatService;
pub use notification_service::NotificationService;
pub use presence_service::PresenceService;
