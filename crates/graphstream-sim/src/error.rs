// SPDX-License-Identifier: Apache-2.0
//! Error type surfaced by the simulation engine.

/// Failures the simulation engine can report. All are recovered locally —
/// the engine never fails outright from a single bad input.
#[derive(Debug, Clone, Copy, thiserror::Error, PartialEq, Eq)]
pub enum SimError {
    /// An inbound nudge referenced a slot with no corresponding node.
    #[error("nudge referenced unknown slot {slot}")]
    InvalidSlot {
        /// The unrecognised slot value.
        slot: u32,
    },
}
