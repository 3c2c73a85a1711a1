// SPDX-License-Identifier: Apache-2.0
//! Force-directed physics kernel: produces new positions/velocities from
//! the current node set once per tick.
//!
//! A scalar reference implementation is always available; building with
//! the `parallel` feature additionally compiles a `rayon`-backed force
//! accumulation path. Both read a frozen snapshot of the current state and
//! write a new one — the kernel itself holds no state between calls, so
//! swapping the two is the caller's responsibility (the simulation loop
//! does this atomically at the tick boundary).

mod error;
mod params;

pub use error::KernelError;
pub use params::KernelParams;

use graphstream_graph::{Node, Vec3, POSITION_LIMIT};

/// Natural (rest) length of a spring edge between connected nodes.
const SPRING_REST_LENGTH: f32 = 1.0;

/// Advances every active node in `nodes` by one tick, in place, using the
/// scalar reference algorithm.
///
/// Inactive nodes (flag bit 0 clear) are skipped both as a force source and
/// target, and are left untouched. Non-finite intermediate forces are
/// coerced to zero before integration, so the kernel never emits NaN.
pub fn step_scalar(nodes: &mut [Node], params: &KernelParams) {
    let snapshot: Vec<Node> = nodes.to_vec();
    for (i, node) in nodes.iter_mut().enumerate() {
        if !node.flags.is_active() {
            continue;
        }
        let force = accumulate_force(i, &snapshot, params);
        integrate(node, force, params);
    }
}

/// Same contract as [`step_scalar`], but accumulates forces for distinct
/// nodes concurrently via `rayon`. Each node reads the whole frozen
/// snapshot and writes only its own slot, so there is no contention.
#[cfg(feature = "parallel")]
pub fn step_parallel(nodes: &mut [Node], params: &KernelParams) {
    use rayon::prelude::*;

    let snapshot: Vec<Node> = nodes.to_vec();
    nodes.par_iter_mut().enumerate().for_each(|(i, node)| {
        if !node.flags.is_active() {
            return;
        }
        let force = accumulate_force(i, &snapshot, params);
        integrate(node, force, params);
    });
}

/// Sums the repulsion, spring, and centering contributions on node `i` from
/// every other active node in `snapshot`.
fn accumulate_force(i: usize, snapshot: &[Node], params: &KernelParams) -> Vec3 {
    let me = snapshot[i];
    let mut force = Vec3::default();

    for (j, other) in snapshot.iter().enumerate() {
        if i == j || !other.flags.is_active() {
            continue;
        }
        let d = me.position.sub(other.position);
        let r = d.length().max(params.collision_radius);
        let d_hat = d.normalized_or_zero();

        let repulsion_mag =
            params.repulsion * f32::from(me.mass) * f32::from(other.mass) / (r * r);
        force = force.add(d_hat.scale(repulsion_mag));

        if me.flags.is_connected() && other.flags.is_connected() {
            let spring_mag = params.spring * (r - SPRING_REST_LENGTH);
            force = force.add(d_hat.scale(-spring_mag));
        }
    }

    if me.flags.is_connected() {
        force = force.add(me.position.scale(-params.attraction));
    }

    force.finite_or_zero()
}

/// Applies one tick of velocity/position integration to `node` given an
/// already-accumulated `force`.
fn integrate(node: &mut Node, force: Vec3, params: &KernelParams) {
    let velocity = node.velocity.add(force).scale(params.damping).finite_or_zero();
    let (velocity, _) = velocity.clamp_reporting(params.max_velocity);
    node.velocity = velocity;

    let position = node.position.add(velocity).finite_or_zero();
    let (position, _) = position.clamp_reporting(params.bounds_size * POSITION_LIMIT);
    node.position = position;
}

#[cfg(test)]
mod tests {
    use super::*;
    use graphstream_graph::{Flags, Slot};

    fn connected_node(slot: u32, x: f32) -> Node {
        Node {
            slot: Slot::new(slot),
            position: Vec3::new(x, 0.0, 0.0),
            velocity: Vec3::default(),
            mass: 1,
            flags: Flags::new(true, true),
        }
    }

    #[test]
    fn kernel_never_emits_non_finite_values() {
        let mut nodes = vec![connected_node(0, 0.0), connected_node(1, 0.0)];
        let params = KernelParams::default();
        for _ in 0..50 {
            step_scalar(&mut nodes, &params);
        }
        for node in &nodes {
            assert!(node.position.x.is_finite());
            assert!(node.position.y.is_finite());
            assert!(node.position.z.is_finite());
            assert!(node.velocity.x.is_finite());
        }
    }

    #[test]
    fn inactive_nodes_are_skipped_as_source_and_target() {
        let mut nodes = vec![connected_node(0, 0.0), connected_node(1, 5.0)];
        nodes[1].flags = Flags::new(false, true);
        let before = nodes[1].position;
        let params = KernelParams::default();
        step_scalar(&mut nodes, &params);
        assert_eq!(nodes[1].position, before);
    }

    #[test]
    fn colocated_nodes_do_not_produce_nan_from_zero_distance() {
        let mut nodes = vec![connected_node(0, 1.0), connected_node(1, 1.0)];
        let params = KernelParams::default();
        step_scalar(&mut nodes, &params);
        assert!(nodes[0].position.x.is_finite());
    }

    #[test]
    fn two_connected_nodes_are_pulled_together_with_opposing_velocity() {
        let mut nodes = vec![connected_node(0, 1.0), connected_node(1, -1.0)];
        let params = KernelParams::default();
        step_scalar(&mut nodes, &params);

        assert!(nodes[0].position.x < 1.0);
        assert!(nodes[1].position.x > -1.0);
        assert!(nodes[0].velocity.x < 0.0);
        assert!(nodes[1].velocity.x > 0.0);
        assert!(nodes[0].velocity.x.abs() <= params.max_velocity);
        assert!(nodes[1].velocity.x.abs() <= params.max_velocity);
    }

    #[cfg(feature = "parallel")]
    #[test]
    fn scalar_and_parallel_paths_agree_within_epsilon() {
        let mut scalar_nodes: Vec<Node> = (0..16)
            .map(|i| connected_node(i, i as f32 * 0.1))
            .collect();
        let mut parallel_nodes = scalar_nodes.clone();
        let params = KernelParams::default();

        for _ in 0..10 {
            step_scalar(&mut scalar_nodes, &params);
            step_parallel(&mut parallel_nodes, &params);
        }

        for (a, b) in scalar_nodes.iter().zip(parallel_nodes.iter()) {
            assert!((a.position.x - b.position.x).abs() < 1e-4);
            assert!((a.position.y - b.position.y).abs() < 1e-4);
            assert!((a.position.z - b.position.z).abs() < 1e-4);
        }
    }
}
