//! # plumb-relay
//!
//! Realtime fan-out layer for the PlumbConnect plumbing marketplace.
//!
//! Durable writes (a chat message, a new chat, a complaint status change)
//! are persisted first and then pushed, best effort, to every websocket
//! that is currently listening on the affected group. Nobody listening is
//! a normal outcome: the row stays and clients catch up over REST.
//!
//! ## Architecture
//!
//! ```text
//! Clients (HTTP, WebSocket)
//!     │
//!     ├── REST Handlers (api/)         ├── WS Gateway (ws/)
//!     │                                │    handshake → Open → Closed
//!     ├── ChatService / NotificationService (service/)
//!     │        persist → dispatch
//!     ├── FanoutDispatcher (domain/)   per-group sequencing
//!     ├── SessionRegistry (domain/)    group → live connections
//!     │
//!     └── Stores (store/)              PostgreSQL or in-memory
//! ```
//!
//! ## Groups
//!
//! Every connection joins `user_{id}`; connections opened on a chat also
//! join `chat_{id}`. See [`domain::GroupKey`].

pub mod api;
pub mod app_state;
pub mod auth;
pub mod config;
pub mod domain;
pub mod error;
pub mod service;
pub mod store;
pub mod ws;
