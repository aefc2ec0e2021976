//! Best-effort fan-out of persisted events to live group members.
//!
//! [`FanoutDispatcher::dispatch`] is called by a write path *after* its
//! row has been committed. It snapshots the group's members from the
//! [`SessionRegistry`], serializes the event once, and makes exactly one
//! non-blocking delivery attempt per member. A failed attempt is logged
//! and dropped; it never affects the other members or the durable write.
//!
//! # Ordering
//!
//! Each group owns a sequencing lane (`Arc<Mutex<u64>>`). Taking the
//! snapshot, stamping `seq` and enqueueing to every member all happen
//! while the lane is held, and every connection drains its queue in FIFO
//! order, so two dispatches to the same group reach each member in the
//! order they were issued. Different groups never wait on each other.

use std::collections::HashMap;
use std::sync::Arc;

use serde::Serialize;
use tokio::sync::Mutex;

use super::event::{Frame, ServerEvent};
use super::session_registry::{DeliveryError, SessionRegistry};
use super::GroupKey;

/// Outcome of one dispatch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DispatchReport {
    /// Target group.
    pub group: GroupKey,
    /// Sequence number stamped on the frame; `None` if nothing was sent.
    pub seq: Option<u64>,
    /// Members a delivery was attempted to.
    pub attempted: usize,
    /// Attempts that were enqueued.
    pub delivered: usize,
    /// Attempts that failed (full or closed queue).
    pub failed: usize,
}

impl DispatchReport {
    fn empty(group: GroupKey) -> Self {
        Self {
            group,
            seq: None,
            attempted: 0,
            delivered: 0,
            failed: 0,
        }
    }
}

/// Pushes serialized events to every live member of a group.
#[derive(Debug)]
pub struct FanoutDispatcher {
    registry: Arc<SessionRegistry>,
    lanes: Mutex<HashMap<GroupKey, Arc<Mutex<u64>>>>,
    push_enabled: bool,
}

impl FanoutDispatcher {
    /// Creates a dispatcher reading membership from `registry`.
    #[must_use]
    pub fn new(registry: Arc<SessionRegistry>) -> Self {
        Self {
            registry,
            lanes: Mutex::new(HashMap::new()),
            push_enabled: true,
        }
    }

    /// Enables or disables live pushes. Durable writes are unaffected.
    #[must_use]
    pub fn with_push_enabled(mut self, enabled: bool) -> Self {
        self.push_enabled = enabled;
        self
    }

    /// Returns the registry this dispatcher reads from.
    #[must_use]
    pub fn registry(&self) -> &Arc<SessionRegistry> {
        &self.registry
    }

    async fn lane(&self, group: GroupKey) -> Arc<Mutex<u64>> {
        let mut lanes = self.lanes.lock().await;
        Arc::clone(lanes.entry(group).or_default())
    }

    /// Pushes `event` to every live member of `group`.
    ///
    /// Never fails: an empty group or a broken member is a normal outcome
    /// and is reflected in the returned [`DispatchReport`].
    pub async fn dispatch(&self, group: GroupKey, event: &ServerEvent) -> DispatchReport {
        if !self.push_enabled {
            tracing::trace!(%group, "live push disabled");
            return DispatchReport::empty(group);
        }

        let lane = self.lane(group).await;
        let mut seq = lane.lock().await;

        let members = self.registry.members(group).await;
        if members.is_empty() {
            drop(seq);
            drop(lane);
            self.forget(&[group]).await;
            tracing::trace!(%group, event = event.event_type_str(), "no live members");
            return DispatchReport::empty(group);
        }

        *seq = seq.saturating_add(1);
        let frame = Frame::encode(Some(*seq), event);

        let mut report = DispatchReport {
            group,
            seq: Some(*seq),
            attempted: members.len(),
            delivered: 0,
            failed: 0,
        };
        for member in &members {
            match member.try_deliver(frame.clone()) {
                Ok(()) => report.delivered += 1,
                Err(DeliveryError::QueueFull) => {
                    report.failed += 1;
                    tracing::warn!(
                        %group,
                        connection = %member.id(),
                        user_id = %member.user_id(),
                        "dropping push for slow connection"
                    );
                }
                Err(DeliveryError::Closed) => {
                    report.failed += 1;
                    tracing::debug!(%group, connection = %member.id(), "push to closed connection");
                }
            }
        }

        tracing::debug!(
            %group,
            event = event.event_type_str(),
            seq = *seq,
            delivered = report.delivered,
            failed = report.failed,
            "dispatched"
        );

        // The last members may have left while the lane was held, in which
        // case their `forget` kept it.
        drop(seq);
        drop(lane);
        if !self.registry.has_members(group).await {
            self.forget(&[group]).await;
        }
        report
    }

    /// Drops sequencing state for groups that are still empty.
    ///
    /// A lane another dispatch holds is kept, so a group never has two
    /// lanes at once; that dispatch forgets it when it finishes.
    pub async fn forget(&self, groups: &[GroupKey]) {
        if groups.is_empty() {
            return;
        }
        let mut lanes = self.lanes.lock().await;
        for group in groups {
            let idle = lanes
                .get(group)
                .is_some_and(|lane| Arc::strong_count(lane) == 1);
            if idle && !self.registry.has_members(*group).await {
                lanes.remove(group);
            }
        }
    }

    /// Number of groups with sequencing state.
    pub async fn lane_count(&self) -> usize {
        self.lanes.lock().await.len()
    }
}
