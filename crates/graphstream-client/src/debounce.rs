// SPDX-License-Identifier: Apache-2.0
//! Inbound nudge coalescing (`spec.md` §4.7): rapid-fire drags collapse to
//! the latest position per node and are flushed in small batches instead of
//! flooding the outbound queue with one message per mouse-move event.

use graphstream_graph::{Slot, Vec3};
use std::collections::HashMap;
use std::time::Duration;

/// How often the debounce buffer is drained.
pub const DEBOUNCE_INTERVAL: Duration = Duration::from_millis(50);

/// Maximum number of node updates released per drain.
pub const MAX_NUDGES_PER_BATCH: usize = 2;

/// A single node's coalesced target position.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NodeUpdate {
    /// The node being nudged.
    pub slot: Slot,
    /// Its latest-wins target position.
    pub position: Vec3,
}

/// Collects per-slot nudges between drains, keeping only the latest
/// position for each slot.
#[derive(Debug, Default)]
pub struct NudgeDebouncer {
    pending: HashMap<Slot, Vec3>,
}

impl NudgeDebouncer {
    /// Creates an empty debouncer.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a nudge, overwriting any pending update for the same slot.
    pub fn record(&mut self, slot: Slot, position: Vec3) {
        self.pending.insert(slot, position);
    }

    /// Number of distinct slots with a pending update.
    #[must_use]
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    /// Drains the buffer, returning at most [`MAX_NUDGES_PER_BATCH`]
    /// updates in ascending slot order (for deterministic output) and
    /// discarding the rest. Returns the number of updates discarded so the
    /// caller can log it.
    pub fn drain(&mut self) -> (Vec<NodeUpdate>, usize) {
        let mut updates: Vec<NodeUpdate> = self
            .pending
            .drain()
            .map(|(slot, position)| NodeUpdate { slot, position })
            .collect();
        updates.sort_by_key(|update| update.slot.get());

        let dropped = updates.len().saturating_sub(MAX_NUDGES_PER_BATCH);
        updates.truncate(MAX_NUDGES_PER_BATCH);
        (updates, dropped)
    }
}
