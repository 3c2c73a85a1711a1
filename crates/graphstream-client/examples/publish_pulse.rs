// SPDX-License-Identifier: Apache-2.0
//! Minimal CLI for exercising a running `graphstream-server`: connects,
//! waits for `connection_established`, then nudges a handful of nodes in a
//! loop so the dashboard/metrics endpoint has something to show.

use anyhow::{Context, Result};
use graphstream_client::{run, ClientCommand, ClientNotification};
use graphstream_graph::{Slot, Vec3};
use tokio::sync::mpsc;
use tracing::info;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    let mut args = std::env::args().skip(1);
    let url = args
        .next()
        .unwrap_or_else(|| "ws://127.0.0.1:8080/ws".to_string());
    let node_count: u32 = args
        .next()
        .as_deref()
        .unwrap_or("5")
        .parse()
        .context("parse node_count")?;
    let pulses: u64 = args
        .next()
        .as_deref()
        .unwrap_or("20")
        .parse()
        .context("parse pulses")?;

    let (command_tx, command_rx) = mpsc::channel(32);
    let (notify_tx, mut notify_rx) = mpsc::channel(32);

    let transport = tokio::spawn(run(url, command_rx, notify_tx));

    tokio::spawn(async move {
        while let Some(notification) = notify_rx.recv().await {
            match notification {
                ClientNotification::StateChanged(state) => info!(?state, "state changed"),
                ClientNotification::Event(event) => info!(?event, "received event"),
            }
        }
    });

    for pulse in 0..pulses {
        for slot in 0..node_count {
            let angle = (pulse as f32 + slot as f32) * 0.3;
            let position = Vec3::new(angle.sin(), angle.cos(), 0.0);
            let command = ClientCommand::Nudge {
                slot: Slot::new(slot),
                position,
            };
            if command_tx.send(command).await.is_err() {
                break;
            }
        }
        tokio::time::sleep(std::time::Duration::from_millis(250)).await;
    }

    drop(command_tx);
    let _ = transport.await;
    Ok(())
}
