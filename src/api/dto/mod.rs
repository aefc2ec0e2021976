//! Data Transfer Objects for REST request/response serialization.
//!
//! Push payloads ([`crate::domain::NotificationPayload`]) double as REST
//! bodies so both channels show a client the same shape.

pub mod chat_dto;
pub mod common_dto;
pub mod complaint_dto;
pub mod notification_dto;
pub mod service_dto;

pub use chat_dto::*;
pub use common_dto::*;
pub use complaint_dto::*;
pub use notification_dto::*;
pub use service_dto::*;
