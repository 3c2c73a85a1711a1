// SPDX-License-Identifier: Apache-2.0
//! Point-in-time ordered view of the node set, as emitted by the
//! simulation loop once per tick.

use crate::{Node, Slot, Vec3};
use serde::{Deserialize, Serialize};

/// One node's wire-relevant state within a [`GraphSnapshot`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SnapshotEntry {
    /// Wire identity.
    pub slot: Slot,
    /// Position at the time of the snapshot.
    pub position: Vec3,
    /// Velocity at the time of the snapshot.
    pub velocity: Vec3,
}

impl From<&Node> for SnapshotEntry {
    fn from(node: &Node) -> Self {
        Self {
            slot: node.slot,
            position: node.position,
            velocity: node.velocity,
        }
    }
}

/// An ordered sequence of node records captured at a tick boundary.
///
/// Order is whatever order the node set produced it in (insertion order in
/// the reference implementation); clients must not assume slots are dense
/// or contiguous. Snapshots carry no header of their own — framing and
/// compression are the proto crate's concern.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GraphSnapshot {
    /// Node records, in emission order.
    pub entries: Vec<SnapshotEntry>,
}

impl GraphSnapshot {
    /// Builds a snapshot from the active node set, preserving iteration
    /// order (including inactive nodes, which still occupy their slot).
    pub fn from_nodes<'a>(nodes: impl IntoIterator<Item = &'a Node>) -> Self {
        Self {
            entries: nodes.into_iter().map(SnapshotEntry::from).collect(),
        }
    }

    /// Number of records in the snapshot.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the snapshot carries no records (a legal no-op frame).
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
