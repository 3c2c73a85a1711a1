// SPDX-License-Identifier: Apache-2.0
//! Operability counters exposed over `GET /api/metrics`, grounded on the
//! teacher gateway's `GatewayMetrics`/`MetricsResponse` split: an internal
//! mutable accumulator plus a serializable snapshot taken on request.

use serde::Serialize;
use std::collections::HashMap;
use std::net::SocketAddr;

/// One connection's bookkeeping.
#[derive(Debug)]
struct ConnMetrics {
    peer: SocketAddr,
    last_seen_ms: u64,
    frames_in: u64,
    frames_out: u64,
}

/// Server-wide operability counters. Updated inline by the reader/writer
/// tasks under a single `Mutex`, since these are diagnostic counters, not
/// graph state — §5 of `spec.md` only forbids locking around the graph.
#[derive(Debug, Default)]
pub struct ServerMetrics {
    next_conn_id: u64,
    total_connections: u64,
    active_connections: usize,

    bytes_in: u64,
    frames_in: u64,
    bytes_out: u64,
    frames_out: u64,

    decode_errors: u64,
    clamped_frames: u64,
    queue_saturations: u64,
    graceful_closes: u64,

    connections: HashMap<u64, ConnMetrics>,
}

#[derive(Debug, Serialize)]
struct DirectionCounters {
    bytes: u64,
    frames: u64,
}

#[derive(Debug, Serialize)]
struct ConnMetricsResponse {
    conn_id: u64,
    peer: String,
    last_seen_ms: u64,
    frames_in: u64,
    frames_out: u64,
}

/// JSON body served at `GET /api/metrics`.
#[derive(Debug, Serialize)]
pub struct MetricsResponse {
    started_at_unix_ms: u64,
    uptime_ms: u64,
    active_connections: usize,
    total_connections: u64,

    inbound: DirectionCounters,
    outbound: DirectionCounters,

    decode_errors: u64,
    clamped_frames: u64,
    queue_saturations: u64,
    graceful_closes: u64,

    connections: Vec<ConnMetricsResponse>,
}

impl ServerMetrics {
    /// Registers a new connection, returning its id.
    pub fn alloc_conn(&mut self, peer: SocketAddr, now_ms: u64) -> u64 {
        let conn_id = self.next_conn_id;
        self.next_conn_id = self.next_conn_id.wrapping_add(1);
        self.total_connections = self.total_connections.wrapping_add(1);
        self.active_connections = self.active_connections.saturating_add(1);
        self.connections.insert(
            conn_id,
            ConnMetrics {
                peer,
                last_seen_ms: now_ms,
                frames_in: 0,
                frames_out: 0,
            },
        );
        conn_id
    }

    /// Deregisters a connection.
    pub fn remove_conn(&mut self, conn_id: u64) {
        self.active_connections = self.active_connections.saturating_sub(1);
        self.connections.remove(&conn_id);
    }

    /// Records an inbound frame of `len` bytes.
    pub fn observe_inbound(&mut self, conn_id: u64, len: usize, now_ms: u64) {
        self.frames_in = self.frames_in.wrapping_add(1);
        self.bytes_in = self.bytes_in.wrapping_add(len as u64);
        if let Some(conn) = self.connections.get_mut(&conn_id) {
            conn.frames_in += 1;
            conn.last_seen_ms = now_ms;
        }
    }

    /// Records an outbound frame of `len` bytes.
    pub fn observe_outbound(&mut self, conn_id: u64, len: usize) {
        self.frames_out = self.frames_out.wrapping_add(1);
        self.bytes_out = self.bytes_out.wrapping_add(len as u64);
        if let Some(conn) = self.connections.get_mut(&conn_id) {
            conn.frames_out += 1;
        }
    }

    /// Counts a decode failure (`spec.md` §7 `MalformedFrame`).
    pub fn observe_decode_error(&mut self) {
        self.decode_errors = self.decode_errors.wrapping_add(1);
    }

    /// Counts a frame that needed clamping/NaN coercion (`OutOfRange`).
    pub fn observe_clamped(&mut self) {
        self.clamped_frames = self.clamped_frames.wrapping_add(1);
    }

    /// Counts a dropped outbound enqueue (`QueueSaturated`).
    pub fn observe_queue_saturation(&mut self) {
        self.queue_saturations = self.queue_saturations.wrapping_add(1);
    }

    /// Counts a session closed after exceeding the consecutive-drop
    /// threshold.
    pub fn observe_graceful_close(&mut self) {
        self.graceful_closes = self.graceful_closes.wrapping_add(1);
    }

    /// Builds the `GET /api/metrics` response body.
    pub fn snapshot(&self, started_at_unix_ms: u64, uptime_ms: u64) -> MetricsResponse {
        let mut connections: Vec<ConnMetricsResponse> = self
            .connections
            .iter()
            .map(|(&conn_id, c)| ConnMetricsResponse {
                conn_id,
                peer: c.peer.to_string(),
                last_seen_ms: c.last_seen_ms,
                frames_in: c.frames_in,
                frames_out: c.frames_out,
            })
            .collect();
        connections.sort_by_key(|c| c.conn_id);

        MetricsResponse {
            started_at_unix_ms,
            uptime_ms,
            active_connections: self.active_connections,
            total_connections: self.total_connections,
            inbound: DirectionCounters {
                bytes: self.bytes_in,
                frames: self.frames_in,
            },
            outbound: DirectionCounters {
                bytes: self.bytes_out,
                frames: self.frames_out,
            },
            decode_errors: self.decode_errors,
            clamped_frames: self.clamped_frames,
            queue_saturations: self.queue_saturations,
            graceful_closes: self.graceful_closes,
            connections,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn alloc_and_remove_conn_tracks_active_count() {
        let mut metrics = ServerMetrics::default();
        let addr: SocketAddr = "127.0.0.1:9000".parse().unwrap();
        let a = metrics.alloc_conn(addr, 0);
        let _b = metrics.alloc_conn(addr, 0);
        assert_eq!(metrics.active_connections, 2);
        metrics.remove_conn(a);
        assert_eq!(metrics.active_connections, 1);
        assert_eq!(metrics.total_connections, 2);
    }

    #[test]
    fn observe_inbound_updates_both_global_and_per_connection_counters() {
        let mut metrics = ServerMetrics::default();
        let addr: SocketAddr = "127.0.0.1:9000".parse().unwrap();
        let conn_id = metrics.alloc_conn(addr, 0);
        metrics.observe_inbound(conn_id, 28, 5);
        assert_eq!(metrics.frames_in, 1);
        assert_eq!(metrics.bytes_in, 28);
        assert_eq!(metrics.connections[&conn_id].last_seen_ms, 5);
    }

    #[test]
    fn snapshot_sorts_connections_by_id() {
        let mut metrics = ServerMetrics::default();
        let addr: SocketAddr = "127.0.0.1:9000".parse().unwrap();
        metrics.alloc_conn(addr, 0);
        metrics.alloc_conn(addr, 0);
        let snapshot = metrics.snapshot(0, 0);
        assert_eq!(snapshot.connections.len(), 2);
        assert!(snapshot.connections[0].conn_id < snapshot.connections[1].conn_id);
    }
}
