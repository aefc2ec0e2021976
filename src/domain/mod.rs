//! Domain layer: identifiers, records, group addressing, and the fan-out core.
//!
//! The durable records (`NotificationRecord`, `ChatRecord`,
//! `MessageRecord`) are produced by write paths and only read here. The
//! live side is the [`SessionRegistry`] (who is listening where) and the
//! [`FanoutDispatcher`] (push one event to everyone in a group).

pub mod chat;
pub mod dispatcher;
pub mod event;
pub mod group;
pub mod ids;
pub mod notification;
pub mod session_registry;
pub mod user;

pub use chat::{ChatRecord, MessageRecord, MessageType, NewMessage, validate_participants};
pub use dispatcher::{DispatchReport, FanoutDispatcher};
pub use event::{Frame, MessagePayload, NotificationPayload, ServerEvent};
pub use group::GroupKey;
pub use ids::{ChatId, ComplaintId, ConnectionId, MessageId, NotificationId, ServiceId, UserId};
pub use notification::{
    ContentRef, NewNotification, NotificationFilter, NotificationPage, NotificationRecord,
    NotificationStats, NotificationType, PageRequest,
};
pub use session_registry::{ConnectionHandle, DeliveryError, SessionRegistry};
pub use user::{Role, UserRecord};
