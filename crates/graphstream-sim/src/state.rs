// SPDX-License-Identifier: Apache-2.0
//! Simulation loop states.

/// The simulation loop's current mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SimulationState {
    /// Nudges are applied to state but physics does not advance and no
    /// snapshot is emitted.
    Paused,
    /// Physics advances once per tick; a snapshot is emitted each tick.
    Running,
    /// Physics is momentarily suspended while active nodes are reseeded to
    /// a random position inside the configured sphere. Resolves to
    /// [`SimulationState::Running`] on the following tick.
    Randomizing,
}
