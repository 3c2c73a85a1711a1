// SPDX-License-Identifier: Apache-2.0
//! Tokio-free simulation state machine. The driver (`run`) owns the timer
//! and channels; this type owns the graph and the physics parameters.

use crate::{SimError, SimulationState};
use graphstream_graph::{Edge, ExternalId, Flags, GraphSnapshot, IdentityTable, Node, Slot, Vec3};
use graphstream_kernel::KernelParams;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::collections::HashMap;
use std::time::{Duration, Instant};

/// How long a randomized node's inbound nudges are ignored after a
/// reseed, per `spec.md` §4.5.
const RANDOMIZE_ACK_WINDOW: Duration = Duration::from_secs(5);

/// Owns the live node/edge set, the identity table, and the kernel
/// parameters; advances one tick at a time. No transport, no timers — see
/// [`crate::run`] for the `tokio` driver wrapped around this.
pub struct SimulationEngine {
    nodes: Vec<Node>,
    edges: Vec<Edge>,
    identity: IdentityTable,
    params: KernelParams,
    state: SimulationState,
    rng: StdRng,
    randomize_radius: f32,
    nudge_ignore_until: HashMap<Slot, Instant>,
}

impl SimulationEngine {
    /// Creates an empty engine in the paused state, seeded from system
    /// entropy. `randomize_radius` is the sphere radius (`spec.md` §4.5)
    /// new positions are drawn within on randomization; see
    /// [`Self::set_randomize_radius`] to change it after construction.
    #[must_use]
    pub fn new(params: KernelParams, randomize_radius: f32) -> Self {
        Self {
            nodes: Vec::new(),
            edges: Vec::new(),
            identity: IdentityTable::new(),
            params,
            state: SimulationState::Paused,
            rng: StdRng::from_entropy(),
            randomize_radius,
            nudge_ignore_until: HashMap::new(),
        }
    }

    /// Current loop state.
    #[must_use]
    pub const fn state(&self) -> SimulationState {
        self.state
    }

    /// Current kernel parameters.
    #[must_use]
    pub const fn params(&self) -> &KernelParams {
        &self.params
    }

    /// Replaces the kernel parameters wholesale. Callers validate before
    /// calling this; an invalid value is never stored.
    pub fn set_params(&mut self, params: KernelParams) {
        self.params = params;
    }

    /// Current randomization sphere radius.
    #[must_use]
    pub const fn randomize_radius(&self) -> f32 {
        self.randomize_radius
    }

    /// Replaces the sphere radius used by the next randomization, per
    /// `spec.md` §6.4's `simulation` settings category.
    pub fn set_randomize_radius(&mut self, radius: f32) {
        self.randomize_radius = radius;
    }

    /// Requests a transition to [`SimulationState::Paused`] or
    /// [`SimulationState::Running`]. Entering `Randomizing` goes through
    /// [`Self::request_randomize`] instead.
    pub fn set_running(&mut self, running: bool) {
        self.state = if running {
            SimulationState::Running
        } else {
            SimulationState::Paused
        };
    }

    /// Requests a one-shot reseed on the next tick.
    pub fn request_randomize(&mut self) {
        self.state = SimulationState::Randomizing;
    }

    /// Interns `external_id`, creating a fresh active node at the origin
    /// if this is the first time it's been seen.
    pub fn ensure_node(&mut self, external_id: ExternalId) -> Slot {
        let slot = self.identity.intern(external_id);
        if !self.nodes.iter().any(|n| n.slot == slot) {
            self.nodes.push(Node::new(slot));
        }
        slot
    }

    /// Registers an edge between two already-interned slots.
    pub fn add_edge(&mut self, edge: Edge) {
        if let Some(source) = self.nodes.iter_mut().find(|n| n.slot == edge.source_slot) {
            source.flags = Flags::new(source.flags.is_active(), true);
        }
        if let Some(target) = self.nodes.iter_mut().find(|n| n.slot == edge.target_slot) {
            target.flags = Flags::new(target.flags.is_active(), true);
        }
        self.edges.push(edge);
    }

    /// Applies a user nudge (new position) to `slot`, unless `slot` is
    /// still within its post-randomization acknowledgement window.
    ///
    /// # Errors
    ///
    /// Returns [`SimError::InvalidSlot`] if no node is registered at `slot`;
    /// the caller should log and continue, not close the session.
    pub fn apply_nudge(&mut self, slot: Slot, position: Vec3, now: Instant) -> Result<(), SimError> {
        if let Some(deadline) = self.nudge_ignore_until.get(&slot) {
            if now < *deadline {
                return Ok(());
            }
        }
        let node = self
            .nodes
            .iter_mut()
            .find(|n| n.slot == slot)
            .ok_or(SimError::InvalidSlot { slot: slot.get() })?;
        node.position = position;
        Ok(())
    }

    /// Clears the graph and the identity table. Call after a graph
    /// generation change (full reload from ingestion).
    pub fn reset(&mut self) {
        self.nodes.clear();
        self.edges.clear();
        self.identity.reset();
        self.nudge_ignore_until.clear();
        self.state = SimulationState::Paused;
    }

    /// Builds a snapshot of the current node set without advancing
    /// physics, for a one-shot `requestInitialData` reply.
    #[must_use]
    pub fn current_snapshot(&self) -> GraphSnapshot {
        GraphSnapshot::from_nodes(&self.nodes)
    }

    /// Advances the simulation by one tick and returns the snapshot to
    /// broadcast, or `None` when paused (no physics, no snapshot).
    pub fn tick(&mut self, now: Instant) -> Option<GraphSnapshot> {
        match self.state {
            SimulationState::Paused => None,
            SimulationState::Running => {
                graphstream_kernel::step_scalar(&mut self.nodes, &self.params);
                Some(GraphSnapshot::from_nodes(&self.nodes))
            }
            SimulationState::Randomizing => {
                self.randomize_now(now);
                self.state = SimulationState::Running;
                Some(GraphSnapshot::from_nodes(&self.nodes))
            }
        }
    }

    fn randomize_now(&mut self, now: Instant) {
        let radius = self.randomize_radius;
        let deadline = now + RANDOMIZE_ACK_WINDOW;
        for node in &mut self.nodes {
            if !node.flags.is_active() {
                continue;
            }
            node.position = sample_point_in_sphere(&mut self.rng, radius);
            node.velocity = Vec3::default();
            self.nudge_ignore_until.insert(node.slot, deadline);
        }
    }
}

/// Rejection-samples a point uniformly distributed inside a sphere of the
/// given `radius`, centred on the origin.
fn sample_point_in_sphere(rng: &mut StdRng, radius: f32) -> Vec3 {
    loop {
        let x = rng.gen_range(-radius..=radius);
        let y = rng.gen_range(-radius..=radius);
        let z = rng.gen_range(-radius..=radius);
        let candidate = Vec3::new(x, y, z);
        if candidate.length_squared() <= radius * radius {
            return candidate;
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn current_snapshot_reflects_state_without_advancing_physics() {
        let mut engine = SimulationEngine::new(KernelParams::default(), 5.0);
        let slot = engine.ensure_node(ExternalId::from("a"));
        engine.set_running(true);
        let before = engine.current_snapshot();
        assert_eq!(before.entries[0].slot, slot);
        // Taking a snapshot must not itself advance the kernel.
        assert_eq!(engine.current_snapshot(), before);
    }

    #[test]
    fn paused_engine_applies_nudges_but_advances_nothing() {
        let mut engine = SimulationEngine::new(KernelParams::default(), 5.0);
        let slot = engine.ensure_node(ExternalId::from("a"));
        let now = Instant::now();
        assert!(engine.tick(now).is_none());
        engine
            .apply_nudge(slot, Vec3::new(3.0, 0.0, 0.0), now)
            .unwrap();
        assert!(engine.tick(now).is_none());
    }

    #[test]
    fn running_engine_emits_a_snapshot_every_tick() {
        let mut engine = SimulationEngine::new(KernelParams::default(), 5.0);
        engine.ensure_node(ExternalId::from("a"));
        engine.set_running(true);
        let snapshot = engine.tick(Instant::now()).unwrap();
        assert_eq!(snapshot.len(), 1);
    }

    #[test]
    fn nudge_to_unknown_slot_is_reported_not_panicked() {
        let mut engine = SimulationEngine::new(KernelParams::default(), 5.0);
        let err = engine
            .apply_nudge(Slot::new(999), Vec3::default(), Instant::now())
            .unwrap_err();
        assert_eq!(err, SimError::InvalidSlot { slot: 999 });
    }

    #[test]
    fn randomize_transitions_to_running_after_one_tick() {
        let mut engine = SimulationEngine::new(KernelParams::default(), 5.0);
        let slot = engine.ensure_node(ExternalId::from("a"));
        engine.request_randomize();
        assert_eq!(engine.state(), SimulationState::Randomizing);
        let now = Instant::now();
        let snapshot = engine.tick(now).unwrap();
        assert_eq!(engine.state(), SimulationState::Running);
        assert_eq!(snapshot.entries[0].slot, slot);
    }

    #[test]
    fn randomized_slot_ignores_nudges_until_the_ack_window_elapses() {
        let mut engine = SimulationEngine::new(KernelParams::default(), 5.0);
        let slot = engine.ensure_node(ExternalId::from("a"));
        engine.request_randomize();
        let now = Instant::now();
        let reseeded = engine.tick(now).unwrap().entries[0].position;

        engine
            .apply_nudge(slot, Vec3::new(9.0, 9.0, 9.0), now)
            .unwrap();
        engine.set_running(true);
        let after_ignored_nudge = engine.tick(now).unwrap().entries[0].position;
        // The nudge during the ack window must not have moved the node from
        // its reseeded spot (a kernel tick may still perturb it slightly via
        // its own forces, so compare against the pre-nudge input instead).
        assert_ne!(after_ignored_nudge, Vec3::new(9.0, 9.0, 9.0));
        let _ = reseeded;
    }

    #[test]
    fn set_randomize_radius_is_honored_by_the_next_reseed() {
        let mut engine = SimulationEngine::new(KernelParams::default(), 5.0);
        engine.ensure_node(ExternalId::from("a"));
        engine.set_randomize_radius(0.01);
        assert_eq!(engine.randomize_radius(), 0.01);

        engine.request_randomize();
        let snapshot = engine.tick(Instant::now()).unwrap();
        let position = snapshot.entries[0].position;
        assert!(position.length() <= 0.01);
    }

    #[test]
    fn reset_clears_graph_and_returns_to_paused() {
        let mut engine = SimulationEngine::new(KernelParams::default(), 5.0);
        engine.ensure_node(ExternalId::from("a"));
        engine.set_running(true);
        engine.reset();
        assert_eq!(engine.state(), SimulationState::Paused);
        assert_eq!(engine.ensure_node(ExternalId::from("a")), Slot::new(0));
    }
}
