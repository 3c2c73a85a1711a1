// SPDX-License-Identifier: Apache-2.0
//! Bidirectional map between ingestion-assigned external ids and the
//! compact slots carried on the wire.

use crate::{ExternalId, Slot};
use std::collections::HashMap;

/// Forward/reverse map between [`ExternalId`] and [`Slot`], plus the
/// monotonic counter used to mint fresh slots.
///
/// Per the simulation task being the sole owner of graph state (no
/// mid-tick locking), this type carries no internal synchronization; the
/// simulation task serializes all `intern`/`reset` calls itself.
#[derive(Debug, Default)]
pub struct IdentityTable {
    forward: HashMap<ExternalId, Slot>,
    reverse: HashMap<Slot, ExternalId>,
    next_slot: u32,
}

impl IdentityTable {
    /// Creates an empty table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the existing slot for `external_id`, or mints a new one.
    ///
    /// Numeric external ids (e.g. `"42"`) claim that exact slot value
    /// directly, *provided* the slot is not already bound to a different
    /// external id — this is how a server-originated slot survives a
    /// client echoing it back as a string. If the numeric slot is already
    /// taken by another name, a fresh slot is minted instead and the
    /// collision is left for the caller to log.
    pub fn intern(&mut self, external_id: ExternalId) -> Slot {
        if let Some(&slot) = self.forward.get(&external_id) {
            return slot;
        }

        let slot = match external_id.as_numeric_slot() {
            Some(numeric) if !self.reverse.contains_key(&Slot(numeric)) => Slot(numeric),
            _ => self.mint_slot(),
        };

        self.next_slot = self.next_slot.max(slot.get().wrapping_add(1));
        self.forward.insert(external_id.clone(), slot);
        self.reverse.insert(slot, external_id);
        slot
    }

    /// Looks up the external id bound to `slot`, if any.
    #[must_use]
    pub fn lookup(&self, slot: Slot) -> Option<&ExternalId> {
        self.reverse.get(&slot)
    }

    /// Looks up the slot bound to `external_id`, if any, without minting one.
    #[must_use]
    pub fn reverse(&self, external_id: &ExternalId) -> Option<Slot> {
        self.forward.get(external_id).copied()
    }

    /// Clears both directions and resets the counter. Call after a graph
    /// generation change (e.g. full reload from ingestion).
    pub fn reset(&mut self) {
        self.forward.clear();
        self.reverse.clear();
        self.next_slot = 0;
    }

    /// Number of interned ids.
    #[must_use]
    pub fn len(&self) -> usize {
        self.forward.len()
    }

    /// Whether the table holds no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.forward.is_empty()
    }

    fn mint_slot(&mut self) -> Slot {
        while self.reverse.contains_key(&Slot(self.next_slot)) {
            self.next_slot = self.next_slot.wrapping_add(1);
        }
        let slot = Slot(self.next_slot);
        self.next_slot = self.next_slot.wrapping_add(1);
        slot
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn intern_mints_slots_in_order_starting_at_zero() {
        let mut table = IdentityTable::new();
        assert_eq!(table.intern(ExternalId::from("file-a")), Slot(0));
        assert_eq!(table.intern(ExternalId::from("file-b")), Slot(1));
        // Interning the same name again returns the same slot.
        assert_eq!(table.intern(ExternalId::from("file-a")), Slot(0));
    }

    #[test]
    fn intern_promotes_numeric_ids_to_their_value() {
        let mut table = IdentityTable::new();
        assert_eq!(table.intern(ExternalId::from("file-a")), Slot(0));
        assert_eq!(table.intern(ExternalId::from("42")), Slot(42));
        assert_eq!(table.intern(ExternalId::from("file-a")), Slot(0));
    }

    #[test]
    fn reset_clears_state_and_counter_never_decreases_without_it() {
        let mut table = IdentityTable::new();
        table.intern(ExternalId::from("file-a"));
        table.intern(ExternalId::from("file-b"));
        table.reset();
        assert_eq!(table.intern(ExternalId::from("file-a")), Slot(0));
        assert!(table.lookup(Slot(1)).is_none());
    }

    #[test]
    fn lookup_and_reverse_agree_with_intern() {
        let mut table = IdentityTable::new();
        let slot = table.intern(ExternalId::from("movie.mp4"));
        assert_eq!(table.lookup(slot), Some(&ExternalId::from("movie.mp4")));
        assert_eq!(table.reverse(&ExternalId::from("movie.mp4")), Some(slot));
        assert_eq!(table.reverse(&ExternalId::from("missing")), None);
    }

    #[test]
    fn numeric_id_colliding_with_a_bound_slot_mints_a_fresh_one() {
        let mut table = IdentityTable::new();
        let first = table.intern(ExternalId::from("0"));
        assert_eq!(first, Slot(0));
        // "0" is already bound, so a second distinct name that happens to
        // parse to the same numeric value must not steal its slot.
        let second = table.intern(ExternalId::from("zero-again"));
        assert_ne!(second, first);
    }
}
