//! Concurrent group membership for live connections.
//!
//! [`SessionRegistry`] maps every [`GroupKey`] to the set of live
//! connections in it, and every connection back to the groups it joined.
//! Both indices live behind a single [`tokio::sync::RwLock`] so that a
//! [`SessionRegistry::members`] snapshot can never observe a connection
//! that is half-way through joining or leaving.
//!
//! The registry is an ordinary value: build one per process in `main` and
//! share it through [`crate::app_state::AppState`]. Tests build as many
//! isolated registries as they like.

use std::collections::{HashMap, HashSet};

use tokio::sync::{RwLock, mpsc};

use super::event::Frame;
use super::{ConnectionId, GroupKey, UserId};

/// Why a single delivery attempt failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum DeliveryError {
    /// The connection's outbound queue is full (slow reader).
    #[error("outbound queue full")]
    QueueFull,
    /// The connection is gone.
    #[error("connection closed")]
    Closed,
}

/// Sending side of one live connection.
///
/// Cloning is cheap; the registry hands out clones in every snapshot.
#[derive(Debug, Clone)]
pub struct ConnectionHandle {
    id: ConnectionId,
    user_id: UserId,
    outbound: mpsc::Sender<Frame>,
}

impl ConnectionHandle {
    /// Wraps the outbound queue of an authenticated connection.
    #[must_use]
    pub fn new(id: ConnectionId, user_id: UserId, outbound: mpsc::Sender<Frame>) -> Self {
        Self {
            id,
            user_id,
            outbound,
        }
    }

    /// Connection identifier.
    #[must_use]
    pub const fn id(&self) -> ConnectionId {
        self.id
    }

    /// Authenticated user owning the connection.
    #[must_use]
    pub const fn user_id(&self) -> UserId {
        self.user_id
    }

    /// Enqueues `frame` without waiting.
    ///
    /// # Errors
    ///
    /// Returns [`DeliveryError::QueueFull`] if the writer is behind and
    /// [`DeliveryError::Closed`] if the connection has gone away.
    pub fn try_deliver(&self, frame: Frame) -> Result<(), DeliveryError> {
        self.outbound.try_send(frame).map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => DeliveryError::QueueFull,
            mpsc::error::TrySendError::Closed(_) => DeliveryError::Closed,
        })
    }
}

#[derive(Debug, Default)]
struct Inner {
    groups: HashMap<GroupKey, HashMap<ConnectionId, ConnectionHandle>>,
    memberships: HashMap<ConnectionId, HashSet<GroupKey>>,
}

impl Inner {
    fn remove(&mut self, group: GroupKey, conn: ConnectionId) -> bool {
        let Some(members) = self.groups.get_mut(&group) else {
            return false;
        };
        if members.remove(&conn).is_none() {
            return false;
        }
        if members.is_empty() {
            self.groups.remove(&group);
        }
        true
    }
}

/// Live group membership.
///
/// # Concurrency
///
/// - `join`, `leave` and `leave_all` take the write lock.
/// - `members` and the counters take the read lock and return owned
///   snapshots, so callers never hold the lock across network I/O.
#[derive(Debug, Default)]
pub struct SessionRegistry {
    inner: RwLock<Inner>,
}

impl SessionRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds `conn` to `group`. Joining twice has no further effect.
    ///
    /// Returns `true` if the connection was not already a member.
    pub async fn join(&self, group: GroupKey, conn: ConnectionHandle) -> bool {
        let mut inner = self.inner.write().await;
        let id = conn.id;
        let inserted = inner
            .groups
            .entry(group)
            .or_default()
            .insert(id, conn)
            .is_none();
        inner.memberships.entry(id).or_default().insert(group);
        inserted
    }

    /// Removes `conn` from `group`. No-op if it is not a member.
    ///
    /// Returns `true` if a membership was removed.
    pub async fn leave(&self, group: GroupKey, conn: ConnectionId) -> bool {
        let mut inner = self.inner.write().await;
        let removed = inner.remove(group, conn);
        if let Some(joined) = inner.memberships.get_mut(&conn) {
            joined.remove(&group);
            if joined.is_empty() {
                inner.memberships.remove(&conn);
            }
        }
        removed
    }

    /// Removes `conn` from every group it joined, in one critical section.
    ///
    /// Returns the groups that have no members left.
    pub async fn leave_all(&self, conn: ConnectionId) -> Vec<GroupKey> {
        let mut inner = self.inner.write().await;
        let joined = inner.memberships.remove(&conn).unwrap_or_default();
        let mut emptied = Vec::new();
        for group in joined {
            inner.remove(group, conn);
            if !inner.groups.contains_key(&group) {
                emptied.push(group);
            }
        }
        emptied
    }

    /// Snapshot of the live members of `group`.
    ///
    /// An unknown group yields an empty list.
    pub async fn members(&self, group: GroupKey) -> Vec<ConnectionHandle> {
        let inner = self.inner.read().await;
        inner
            .groups
            .get(&group)
            .map(|m| m.values().cloned().collect())
            .unwrap_or_default()
    }

    /// Returns `true` if `group` has at least one live member.
    pub async fn has_members(&self, group: GroupKey) -> bool {
        let inner = self.inner.read().await;
        inner.groups.get(&group).is_some_and(|m| !m.is_empty())
    }

    /// Returns `true` if `conn` is currently a member of `group`.
    pub async fn is_member(&self, group: GroupKey, conn: ConnectionId) -> bool {
        let inner = self.inner.read().await;
        inner
            .groups
            .get(&group)
            .is_some_and(|m| m.contains_key(&conn))
    }

    /// Groups `conn` currently belongs to.
    pub async fn groups_of(&self, conn: ConnectionId) -> Vec<GroupKey> {
        let inner = self.inner.read().await;
        inner
            .memberships
            .get(&conn)
            .map(|g| g.iter().copied().collect())
            .unwrap_or_default()
    }

    /// Number of non-empty groups.
    pub async fn group_count(&self) -> usize {
        self.inner.read().await.groups.len()
    }

    /// Number of connections with at least one membership.
    pub async fn connection_count(&self) -> usize {
        self.inner.read().await.memberships.len()
    }
}
