// SPDX-License-Identifier: Apache-2.0
//! The outbound backpressure queue (`spec.md` §4.7): a bounded buffer of
//! messages waiting to be written to the transport, with a policy that
//! favors freshness of position data over strict FIFO ordering.

use graphstream_graph::{Slot, Vec3};
use graphstream_proto::ControlMessage;
use std::collections::VecDeque;

/// Minimum capacity the queue may be constructed with, per `spec.md` §4.7.
pub const MIN_CAPACITY: usize = 100;

/// Default capacity used when a caller doesn't need a tighter bound.
pub const DEFAULT_CAPACITY: usize = 128;

/// One item waiting to be sent to the server.
#[derive(Debug, Clone, PartialEq)]
pub enum OutboundItem {
    /// A position nudge for a single node.
    Nudge {
        /// The node being nudged.
        slot: Slot,
        /// Proposed new position.
        position: Vec3,
    },
    /// A control-channel message.
    Control(ControlMessage),
}

impl OutboundItem {
    const fn nudge_slot(&self) -> Option<Slot> {
        match self {
            Self::Nudge { slot, .. } => Some(*slot),
            Self::Control(_) => None,
        }
    }
}

/// A bounded outbound queue implementing `spec.md` §4.7's backpressure
/// policy: when full, a new nudge replaces any already-queued nudge for the
/// same slot in place; otherwise the oldest non-nudge item is evicted to
/// make room, and only if none exists does the oldest item of any kind go.
#[derive(Debug)]
pub struct OutboundQueue {
    capacity: usize,
    items: VecDeque<OutboundItem>,
}

/// Outcome of a single [`OutboundQueue::push`] call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PushOutcome {
    /// The item was appended without evicting anything.
    Appended,
    /// The item replaced an already-queued nudge for the same slot.
    ReplacedPendingNudge,
    /// The queue was full; an older item was evicted to make room.
    EvictedOldest,
}

impl OutboundQueue {
    /// Creates a queue with the given capacity. Capacities below
    /// [`MIN_CAPACITY`] are raised to it.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(MIN_CAPACITY),
            items: VecDeque::new(),
        }
    }

    /// Number of items currently queued.
    #[must_use]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Whether the queue holds no items.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Pushes `item`, applying the backpressure policy if the queue is full
    /// or the item is a nudge that supersedes one already queued.
    pub fn push(&mut self, item: OutboundItem) -> PushOutcome {
        if let Some(slot) = item.nudge_slot() {
            if let Some(existing) = self
                .items
                .iter_mut()
                .find(|queued| queued.nudge_slot() == Some(slot))
            {
                *existing = item;
                return PushOutcome::ReplacedPendingNudge;
            }
        }

        if self.items.len() < self.capacity {
            self.items.push_back(item);
            return PushOutcome::Appended;
        }

        let evict_at = self
            .items
            .iter()
            .position(|queued| queued.nudge_slot().is_none())
            .unwrap_or(0);
        self.items.remove(evict_at);
        self.items.push_back(item);
        PushOutcome::EvictedOldest
    }

    /// Pops the oldest queued item, if any.
    pub fn pop(&mut self) -> Option<OutboundItem> {
        self.items.pop_front()
    }
}
