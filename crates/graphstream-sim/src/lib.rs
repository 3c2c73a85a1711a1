// SPDX-License-Identifier: Apache-2.0
//! Tokio driver for the simulation engine.
//!
//! [`SimulationEngine`] is transport- and timer-free; this module owns the
//! fixed-step snapshot timer and the inbound command channel, and is the
//! only place in the workspace that calls [`SimulationEngine::tick`]. Every
//! mutation — ingestion, nudges, parameter changes, randomization —
//! arrives as a [`SimCommand`] and is applied before the next tick, per
//! `spec.md` §5's "no locks around the graph mid-tick" rule.

mod engine;
mod error;
mod state;

pub use engine::SimulationEngine;
pub use error::SimError;
pub use state::SimulationState;

use graphstream_graph::{Edge, ExternalId, GraphSnapshot, Slot, Vec3};
use graphstream_kernel::{KernelError, KernelParams};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::{broadcast, mpsc, oneshot};
use tokio::time::{interval, Duration, MissedTickBehavior};
use tracing::warn;

/// A request applied to the engine at the next tick boundary.
pub enum SimCommand {
    /// Apply a user-originated position nudge to `slot`. Dropped with a
    /// warning (not surfaced to the caller) if `slot` is unknown or still
    /// within its post-randomization acknowledgement window.
    Nudge {
        /// Target node.
        slot: Slot,
        /// New position.
        position: Vec3,
    },
    /// Interns `external_id`, creating the node on first sighting, and
    /// replies with its resolved slot.
    EnsureNode {
        /// Ingestion-assigned name.
        external_id: ExternalId,
        /// Channel the resolved slot is sent back on.
        reply: oneshot::Sender<Slot>,
    },
    /// Registers an edge between two already-interned slots.
    AddEdge(Edge),
    /// Requests the current node set without waiting for the next tick,
    /// for `requestInitialData` (`spec.md` §6.3): a one-shot snapshot
    /// handed directly to the requesting session rather than broadcast.
    RequestSnapshot {
        /// Channel the snapshot is sent back on.
        reply: oneshot::Sender<GraphSnapshot>,
    },
    /// Pauses (`false`) or resumes (`true`) physics.
    SetRunning(bool),
    /// Requests a one-shot reseed of every active node on the next tick.
    RequestRandomize,
    /// Schedules exactly one extra tick ahead of the next scheduled one,
    /// per the `applyForces` resolution recorded in `DESIGN.md`.
    ApplyForcesOnce,
    /// Validates and installs new kernel parameters. The previous value
    /// stays in effect if validation fails; either outcome is reported back
    /// so the control channel can surface `ValidationFailed`.
    SetParams {
        /// Proposed parameters.
        params: KernelParams,
        /// Validation outcome.
        reply: oneshot::Sender<Result<(), KernelError>>,
    },
    /// Clears the graph and identity table after a generation change.
    Reset,
    /// Replaces the sphere radius used on the next randomization reseed,
    /// per `spec.md` §6.4's `simulation` settings category.
    SetRandomizeRadius(f32),
}

/// Default broadcast channel depth for published snapshots, used when a
/// caller has no more specific `maxQueueSize` configured.
pub const DEFAULT_SNAPSHOT_CAPACITY: usize = 128;

/// Drives `engine` until every [`SimCommand`] sender is dropped.
///
/// Ticks at `1 / update_rate_hz` (clamped to the 1-120 Hz range from
/// `spec.md` §4.5); if a command arrives while a tick is also ready, the
/// command is applied first so it lands at the start of the step that
/// follows, never mid-tick. `applyForces` does not reset the steady timer's
/// phase: it only flags one additional tick to run immediately after the
/// next scheduled one.
pub async fn run(
    mut engine: SimulationEngine,
    mut commands: mpsc::Receiver<SimCommand>,
    snapshots: broadcast::Sender<Arc<GraphSnapshot>>,
    update_rate_hz: f32,
) {
    let period = Duration::from_secs_f32(1.0 / update_rate_hz.clamp(1.0, 120.0));
    let mut ticker = interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let mut extra_tick_pending = false;

    loop {
        tokio::select! {
            maybe_cmd = commands.recv() => {
                match maybe_cmd {
                    Some(cmd) => apply_command(&mut engine, cmd, &mut extra_tick_pending),
                    None => break,
                }
            }
            _ = ticker.tick() => {
                tick_and_publish(&mut engine, &snapshots);
                if extra_tick_pending {
                    extra_tick_pending = false;
                    tick_and_publish(&mut engine, &snapshots);
                }
            }
        }
    }
}

fn tick_and_publish(engine: &mut SimulationEngine, snapshots: &broadcast::Sender<Arc<GraphSnapshot>>) {
    if let Some(snapshot) = engine.tick(Instant::now()) {
        // An error here only means nobody is currently subscribed; the
        // snapshot is simply not needed by anyone this tick.
        let _ = snapshots.send(Arc::new(snapshot));
    }
}

fn apply_command(engine: &mut SimulationEngine, cmd: SimCommand, extra_tick_pending: &mut bool) {
    match cmd {
        SimCommand::Nudge { slot, position } => {
            if let Err(err) = engine.apply_nudge(slot, position, Instant::now()) {
                warn!(%err, "dropping nudge for unknown slot");
            }
        }
        SimCommand::EnsureNode { external_id, reply } => {
            let slot = engine.ensure_node(external_id);
            let _ = reply.send(slot);
        }
        SimCommand::AddEdge(edge) => engine.add_edge(edge),
        SimCommand::RequestSnapshot { reply } => {
            let _ = reply.send(engine.current_snapshot());
        }
        SimCommand::SetRunning(running) => engine.set_running(running),
        SimCommand::RequestRandomize => engine.request_randomize(),
        SimCommand::ApplyForcesOnce => *extra_tick_pending = true,
        SimCommand::SetParams { params, reply } => {
            let result = params.validate();
            if result.is_ok() {
                engine.set_params(params);
            }
            let _ = reply.send(result);
        }
        SimCommand::Reset => engine.reset(),
        SimCommand::SetRandomizeRadius(radius) => engine.set_randomize_radius(radius),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use graphstream_graph::Flags;
    use tokio::time::{sleep, timeout};

    #[tokio::test(start_paused = true)]
    async fn running_engine_publishes_snapshots_at_the_configured_rate() {
        let mut engine = SimulationEngine::new(KernelParams::default(), 5.0);
        engine.ensure_node(ExternalId::from("a"));
        engine.set_running(true);

        let (cmd_tx, cmd_rx) = mpsc::channel(8);
        let (snap_tx, mut snap_rx) = broadcast::channel(DEFAULT_SNAPSHOT_CAPACITY);
        tokio::spawn(run(engine, cmd_rx, snap_tx, 10.0));

        let snapshot = timeout(Duration::from_secs(1), snap_rx.recv())
            .await
            .expect("snapshot within timeout")
            .expect("channel open");
        assert_eq!(snapshot.len(), 1);
        drop(cmd_tx);
    }

    #[tokio::test(start_paused = true)]
    async fn ensure_node_round_trips_through_the_command_channel() {
        let engine = SimulationEngine::new(KernelParams::default(), 5.0);
        let (cmd_tx, cmd_rx) = mpsc::channel(8);
        let (snap_tx, _snap_rx) = broadcast::channel(DEFAULT_SNAPSHOT_CAPACITY);
        tokio::spawn(run(engine, cmd_rx, snap_tx, 30.0));

        let (reply_tx, reply_rx) = oneshot::channel();
        cmd_tx
            .send(SimCommand::EnsureNode {
                external_id: ExternalId::from("movie.mp4"),
                reply: reply_tx,
            })
            .await
            .unwrap();
        let slot = timeout(Duration::from_secs(1), reply_rx)
            .await
            .expect("reply within timeout")
            .expect("sender not dropped");
        assert_eq!(slot, Slot::new(0));
    }

    #[tokio::test(start_paused = true)]
    async fn request_snapshot_round_trips_without_waiting_for_a_tick() {
        let mut engine = SimulationEngine::new(KernelParams::default(), 5.0);
        engine.ensure_node(ExternalId::from("a"));
        let (cmd_tx, cmd_rx) = mpsc::channel(8);
        let (snap_tx, _snap_rx) = broadcast::channel(DEFAULT_SNAPSHOT_CAPACITY);
        tokio::spawn(run(engine, cmd_rx, snap_tx, 1.0));

        let (reply_tx, reply_rx) = oneshot::channel();
        cmd_tx
            .send(SimCommand::RequestSnapshot { reply: reply_tx })
            .await
            .unwrap();
        let snapshot = timeout(Duration::from_secs(1), reply_rx)
            .await
            .expect("reply within timeout")
            .expect("sender not dropped");
        assert_eq!(snapshot.len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn invalid_params_are_rejected_and_reported() {
        let engine = SimulationEngine::new(KernelParams::default(), 5.0);
        let (cmd_tx, cmd_rx) = mpsc::channel(8);
        let (snap_tx, _snap_rx) = broadcast::channel(DEFAULT_SNAPSHOT_CAPACITY);
        tokio::spawn(run(engine, cmd_rx, snap_tx, 30.0));

        let bad = KernelParams {
            damping: 10.0,
            ..KernelParams::default()
        };
        let (reply_tx, reply_rx) = oneshot::channel();
        cmd_tx
            .send(SimCommand::SetParams {
                params: bad,
                reply: reply_tx,
            })
            .await
            .unwrap();
        let result = timeout(Duration::from_secs(1), reply_rx).await.unwrap().unwrap();
        assert!(result.is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn set_randomize_radius_command_reaches_the_running_engine() {
        let mut engine = SimulationEngine::new(KernelParams::default(), 5.0);
        engine.ensure_node(ExternalId::from("a"));
        let (cmd_tx, cmd_rx) = mpsc::channel(8);
        let (snap_tx, mut snap_rx) = broadcast::channel(DEFAULT_SNAPSHOT_CAPACITY);
        tokio::spawn(run(engine, cmd_rx, snap_tx, 30.0));

        cmd_tx
            .send(SimCommand::SetRandomizeRadius(0.01))
            .await
            .unwrap();
        cmd_tx.send(SimCommand::RequestRandomize).await.unwrap();
        cmd_tx.send(SimCommand::SetRunning(true)).await.unwrap();

        let snapshot = timeout(Duration::from_secs(1), snap_rx.recv())
            .await
            .expect("snapshot within timeout")
            .expect("channel open");
        assert!(snapshot.entries[0].position.length() <= 0.01);
    }

    #[tokio::test(start_paused = true)]
    async fn paused_engine_never_publishes() {
        let mut engine = SimulationEngine::new(KernelParams::default(), 5.0);
        let slot = engine.ensure_node(ExternalId::from("a"));
        let _ = Flags::new(true, false);
        let (cmd_tx, cmd_rx) = mpsc::channel(8);
        let (snap_tx, mut snap_rx) = broadcast::channel(DEFAULT_SNAPSHOT_CAPACITY);
        tokio::spawn(run(engine, cmd_rx, snap_tx, 50.0));

        cmd_tx
            .send(SimCommand::Nudge {
                slot,
                position: Vec3::new(1.0, 0.0, 0.0),
            })
            .await
            .unwrap();
        sleep(Duration::from_millis(200)).await;
        assert!(matches!(
            snap_rx.try_recv(),
            Err(broadcast::error::TryRecvError::Empty)
        ));
    }
}
