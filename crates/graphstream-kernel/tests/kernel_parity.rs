// SPDX-License-Identifier: Apache-2.0
//! Confirms the scalar and `parallel`-feature force-accumulation paths
//! agree within the documented epsilon over a larger, denser graph than
//! the crate's own unit tests exercise.

#![cfg(feature = "parallel")]

use graphstream_graph::{Flags, Node, Slot, Vec3};
use graphstream_kernel::{step_parallel, step_scalar, KernelParams};

fn grid_of_nodes(count: u32) -> Vec<Node> {
    (0..count)
        .map(|i| Node {
            slot: Slot::new(i),
            position: Vec3::new(
                f32::from((i % 5) as u8),
                f32::from((i / 5 % 5) as u8),
                f32::from((i / 25) as u8),
            ),
            velocity: Vec3::default(),
            mass: 1 + (i % 3) as u8,
            flags: Flags::new(true, i % 2 == 0),
        })
        .collect()
}

#[test]
fn fifty_connected_nodes_stay_within_1e4_over_30_ticks() {
    let mut scalar_nodes = grid_of_nodes(50);
    let mut parallel_nodes = scalar_nodes.clone();
    let params = KernelParams::default();

    for _ in 0..30 {
        step_scalar(&mut scalar_nodes, &params);
        step_parallel(&mut parallel_nodes, &params);
    }

    for (a, b) in scalar_nodes.iter().zip(parallel_nodes.iter()) {
        assert!((a.position.x - b.position.x).abs() < 1e-4);
        assert!((a.position.y - b.position.y).abs() < 1e-4);
        assert!((a.position.z - b.position.z).abs() < 1e-4);
        assert!((a.velocity.x - b.velocity.x).abs() < 1e-4);
    }
}
