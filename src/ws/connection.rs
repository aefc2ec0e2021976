//! WebSocket connection state machine.
//!
//! Handles the read/write loop for a single WebSocket connection: inbound
//! client frames go to the write paths, outbound frames come from the
//! connection's queue, which the dispatcher fills.

use std::fmt;

use axum::extract::ws::{Message, WebSocket};
use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;

use super::messages::ClientFrame;
use super::subscription::Scope;
use crate::app_state::AppState;
use crate::auth::Identity;
use crate::domain::{
    ConnectionHandle, ConnectionId, Frame, NotificationPayload, ServerEvent, UserId,
};
use crate::error::RelayError;

/// Lifecycle of one connection.
///
/// ```text
/// Connecting → Authenticating → Authenticated → Open → Closed
///                             ↘ Rejected
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// Upgrade request received.
    Connecting,
    /// Checking the bearer credential and chat access.
    Authenticating,
    /// Handshake accepted; upgrade pending.
    Authenticated,
    /// Handshake refused; terminal.
    Rejected,
    /// Registered and relaying.
    Open,
    /// Torn down; terminal.
    Closed,
}

impl ConnectionState {
    /// Returns `true` if moving to `next` is a legal step.
    #[must_use]
    pub const fn can_transition_to(self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::Connecting, Self::Authenticating)
                | (Self::Authenticating, Self::Authenticated | Self::Rejected)
                | (Self::Authenticated, Self::Open | Self::Closed)
                | (Self::Open, Self::Closed)
        )
    }

    /// Lower-case name used in logs.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Connecting => "connecting",
            Self::Authenticating => "authenticating",
            Self::Authenticated => "authenticated",
            Self::Rejected => "rejected",
            Self::Open => "open",
            Self::Closed => "closed",
        }
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Tracks and logs the state of one connection from handshake to close.
#[derive(Debug)]
pub struct Lifecycle {
    id: ConnectionId,
    scope: Scope,
    state: ConnectionState,
}

impl Lifecycle {
    /// Starts tracking a new upgrade request.
    #[must_use]
    pub fn new(scope: Scope) -> Self {
        let id = ConnectionId::new();
        tracing::debug!(conn_id = %id, %scope, state = %ConnectionState::Connecting, "connection state");
        Self {
            id,
            scope,
            state: ConnectionState::Connecting,
        }
    }

    /// Identifier assigned to this connection.
    #[must_use]
    pub const fn id(&self) -> ConnectionId {
        self.id
    }

    /// Current state.
    #[must_use]
    pub const fn state(&self) -> ConnectionState {
        self.state
    }

    /// Moves to `next`, logging the step. Illegal steps are logged and
    /// still applied so the terminal states are always reached.
    pub fn advance(&mut self, next: ConnectionState) {
        if self.state.can_transition_to(next) {
            tracing::debug!(conn_id = %self.id, scope = %self.scope, from = %self.state, to = %next, "connection state");
        } else {
            tracing::warn!(conn_id = %self.id, scope = %self.scope, from = %self.state, to = %next, "unexpected connection state change");
        }
        self.state = next;
    }
}

/// Runs the read/write loop for a single WebSocket connection.
///
/// - Joins the scope's groups and marks the user online.
/// - Sends `connection_established`, then relays until either side closes.
/// - Always leaves every group on the way out.
pub async fn run_connection(
    socket: WebSocket,
    state: AppState,
    identity: Identity,
    scope: Scope,
    mut lifecycle: Lifecycle,
) {
    let user_id = identity.user_id;
    let conn_id = lifecycle.id();
    let (outbound_tx, mut outbound_rx) = mpsc::channel::<Frame>(state.outbound_queue_capacity);
    let handle = ConnectionHandle::new(conn_id, user_id, outbound_tx);

    let groups = scope.groups(user_id);
    state.presence.connect(handle, &groups).await;
    lifecycle.advance(ConnectionState::Open);
    tracing::info!(%conn_id, %user_id, %scope, "connection opened");

    let (mut ws_tx, mut ws_rx) = socket.split();
    let welcome = ServerEvent::ConnectionEstablished {
        user_id,
        groups: groups.clone(),
    }
    .to_frame();

    if ws_tx.send(Message::text(welcome.as_str())).await.is_ok() {
        loop {
            tokio::select! {
                msg = ws_rx.next() => {
                    match msg {
                        Some(Ok(Message::Text(text))) => {
                            let reply = handle_client_frame(&state, user_id, scope, text.as_str()).await;
                            if let Some(frame) = reply
                                && ws_tx.send(Message::text(frame.as_str())).await.is_err() {
                                    break;
                                }
                        }
                        Some(Ok(Message::Close(_))) | None => break,
                        Some(Err(e)) => {
                            tracing::debug!(%conn_id, error = %e, "ws read failed");
                            break;
                        }
                        _ => {}
                    }
                }
                frame = outbound_rx.recv() => {
                    let Some(frame) = frame else {
                        break;
                    };
                    if ws_tx.send(Message::text(frame.as_str())).await.is_err() {
                        break;
                    }
                }
            }
        }
    }

    lifecycle.advance(ConnectionState::Closed);
    state.presence.disconnect(conn_id, user_id).await;
    tracing::info!(%conn_id, %user_id, %scope, "connection closed");
}

/// Handles one text frame, returning the direct reply, if any.
///
/// Chat messages get no direct reply: the sender sees its own message
/// through the chat room push, in order with everyone else's.
async fn handle_client_frame(
    state: &AppState,
    user_id: UserId,
    scope: Scope,
    text: &str,
) -> Option<Frame> {
    let result = match ClientFrame::parse(text) {
        Ok(ClientFrame::Ping) => Ok(Some(ServerEvent::Pong)),
        Ok(ClientFrame::ChatMessage {
            content,
            message_type,
        }) => match scope.chat() {
            Some(chat_id) => state
                .chat_service
                .send_message(chat_id, user_id, &content, message_type)
                .await
                .map(|_| None),
            None => Err(RelayError::InvalidFrame(
                "chat_message is only accepted on chat connections".to_string(),
            )),
        },
        Ok(ClientFrame::MarkRead { notification_id }) => state
            .notification_service
            .mark_read(user_id, notification_id)
            .await
            .map(|record| {
                Some(ServerEvent::NotificationRead {
                    notification: NotificationPayload::from(&record),
                })
            }),
        Err(e) => Err(e),
    };

    match result {
        Ok(reply) => reply.map(|event| event.to_frame()),
        Err(e) => {
            if e.status_code().is_server_error() {
                tracing::warn!(%user_id, error = %e, "frame handling failed");
            } else {
                tracing::debug!(%user_id, error = %e, "frame rejected");
            }
            Some(e.to_event().to_frame())
        }
    }
}
