//! Connection membership and the `is_online` flag, kept in step.
//!
//! Opening a connection joins its groups and writes "online"; closing it
//! leaves every group and writes "offline" if it was the user's last one.
//! Both sequences run under a per-user lock, so the presence write that
//! lands last always matches the registry.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{Mutex, OwnedMutexGuard};

use crate::domain::{ConnectionHandle, ConnectionId, FanoutDispatcher, GroupKey, UserId};
use crate::store::UserStore;

/// Registers connections and maintains user presence.
#[derive(Debug)]
pub struct PresenceService {
    dispatcher: Arc<FanoutDispatcher>,
    users: Arc<dyn UserStore>,
    locks: Mutex<HashMap<UserId, Arc<Mutex<()>>>>,
}

impl PresenceService {
    /// Creates a service over the dispatcher's registry.
    #[must_use]
    pub fn new(dispatcher: Arc<FanoutDispatcher>, users: Arc<dyn UserStore>) -> Self {
        Self {
            dispatcher,
            users,
            locks: Mutex::new(HashMap::new()),
        }
    }

    async fn lock(&self, user_id: UserId) -> OwnedMutexGuard<()> {
        let lock = {
            let mut locks = self.locks.lock().await;
            Arc::clone(locks.entry(user_id).or_default())
        };
        lock.lock_owned().await
    }

    /// Drops the user's lock once nobody holds or awaits it.
    async fn release(&self, user_id: UserId) {
        let mut locks = self.locks.lock().await;
        if locks
            .get(&user_id)
            .is_some_and(|lock| Arc::strong_count(lock) == 1)
        {
            locks.remove(&user_id);
        }
    }

    /// Joins `handle` to every group in `groups` and marks its user online.
    pub async fn connect(&self, handle: ConnectionHandle, groups: &[GroupKey]) {
        let user_id = handle.user_id();
        let _guard = self.lock(user_id).await;
        let registry = self.dispatcher.registry();
        for group in groups {
            registry.join(*group, handle.clone()).await;
        }
        self.write(user_id, true).await;
    }

    /// Removes `conn` from every group and marks `user_id` offline if no
    /// other connection of theirs remains.
    pub async fn disconnect(&self, conn: ConnectionId, user_id: UserId) {
        let emptied = {
            let _guard = self.lock(user_id).await;
            let emptied = self.dispatcher.registry().leave_all(conn).await;
            if emptied.contains(&GroupKey::user(user_id)) {
                self.write(user_id, false).await;
            }
            emptied
        };
        self.release(user_id).await;
        self.dispatcher.forget(&emptied).await;
    }

    async fn write(&self, user_id: UserId, online: bool) {
        if let Err(e) = self.users.set_presence(user_id, online).await {
            tracing::warn!(%user_id, online, error = %e, "presence update failed");
        }
    }
}
