// SPDX-License-Identifier: Apache-2.0
//! Node/edge data model, the slot/external-id identity table, and the
//! insertion-ordered snapshot shared by the simulation and every session.
//!
//! This crate is pure data: it owns no transport, no timers, and no
//! concurrency primitives. The kernel and simulation loop mutate these types
//! directly; the proto crate encodes/decodes them for the wire.

mod identity;
mod node;
mod snapshot;

use serde::{Deserialize, Serialize};

pub use identity::IdentityTable;
pub use node::{Edge, Flags, Node, Vec3, POSITION_LIMIT, VELOCITY_LIMIT};
pub use snapshot::{GraphSnapshot, SnapshotEntry};

/// Compact wire identity for a node, stable for the lifetime of a graph
/// generation. Wrapped so kernel/identity-table APIs can't be handed a bare
/// `u32` meant for something else.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
pub struct Slot(pub u32);

impl Slot {
    /// Constructs a slot from its raw wire value.
    #[must_use]
    pub const fn new(value: u32) -> Self {
        Self(value)
    }

    /// Returns the raw wire value.
    #[must_use]
    pub const fn get(self) -> u32 {
        self.0
    }
}

impl From<u32> for Slot {
    fn from(value: u32) -> Self {
        Self(value)
    }
}

impl From<Slot> for u32 {
    fn from(slot: Slot) -> Self {
        slot.0
    }
}

/// Printable identifier chosen by the ingestion layer (filename, opaque
/// name, or a decimal slot number echoed back by a client).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ExternalId(pub String);

impl ExternalId {
    /// Parses this id as a decimal `u32` if it is purely numeric.
    #[must_use]
    pub fn as_numeric_slot(&self) -> Option<u32> {
        self.0.parse().ok()
    }
}

impl<T: Into<String>> From<T> for ExternalId {
    fn from(value: T) -> Self {
        Self(value.into())
    }
}

impl std::fmt::Display for ExternalId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn slot_serializes_as_a_bare_json_number() {
        let slot = Slot::new(42);
        assert_eq!(serde_json::to_string(&slot).unwrap(), "42");
        assert_eq!(serde_json::from_str::<Slot>("42").unwrap(), slot);
    }

    #[test]
    fn node_round_trips_through_json_for_cross_process_callers() {
        let mut node = Node::new(Slot::new(7));
        node.position = Vec3::new(1.0, -2.0, 3.0);
        let text = serde_json::to_string(&node).unwrap();
        let back: Node = serde_json::from_str(&text).unwrap();
        assert_eq!(back, node);
    }
}
