// SPDX-License-Identifier: Apache-2.0
//! Per-connection server-side lifecycle (`spec.md` §4.6), and the typed
//! channel a session's writer task is driven by.
//!
//! This is deliberately smaller than [`graphstream_client::ConnectionStateMachine`]:
//! the server never reconnects to a client, so there is no backoff/attempt
//! bookkeeping here, only the portion of the diagram the server itself
//! drives — transport accept through to close.

/// A server-observed session state, mirroring the CONNECTED/READY portion
/// of `spec.md` §4.6's diagram.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Transport handshake (the WebSocket upgrade) succeeded;
    /// `connection_established` has not yet been sent.
    Connected,
    /// `connection_established` has been sent. Binary traffic from this
    /// session is now accepted rather than discarded.
    Ready,
    /// The session is closing or closed.
    Closed,
}

/// A message delivered to a session's writer task. Keeps the writer's
/// `select!` to exactly two branches: the broadcast snapshot stream and
/// this per-session command channel, following the reader/writer split
/// `spec.md` §5 describes for session tasks.
#[derive(Debug, Clone)]
pub enum SessionCommand {
    /// A pre-serialized control-channel text frame.
    Control(String),
    /// A one-shot binary frame (e.g. the `requestInitialData` reply),
    /// encoded and compressed the same way the broadcast path is.
    Binary(Vec<u8>),
    /// Close the connection gracefully; any further queued sends are
    /// skipped.
    Close,
}

/// Bound applied to a session's outbound command channel when no more
/// specific `maxQueueSize` is configured.
pub const DEFAULT_QUEUE_CAPACITY: usize = 100;
