// SPDX-License-Identifier: Apache-2.0
//! Ties the connection state machine, outbound queue, nudge debouncer, and
//! rate limiter into one per-connection session object (`spec.md` §4.7).
//! The session holds no transport; [`crate::transport`] drives it over a
//! real WebSocket.

use crate::debounce::NudgeDebouncer;
use crate::queue::{OutboundItem, OutboundQueue, PushOutcome, DEFAULT_CAPACITY};
use crate::rate_limit::RateLimiter;
use crate::state::{ConnectionState, ConnectionStateMachine};
use graphstream_graph::{Slot, Vec3};
use graphstream_proto::{decode_record_frame, decompress_frame, ControlMessage, DecodeReport, NodeRecord, ProtoError};
use tokio::time::Instant;
use tracing::{debug, warn};

/// Something the session learned from the server.
#[derive(Debug, Clone, PartialEq)]
pub enum ClientEvent {
    /// A binary frame decoded into node records.
    Snapshot {
        /// Decoded records, in wire order.
        records: Vec<NodeRecord>,
        /// Summary of clamping/record count for a single log line.
        report: DecodeReport,
    },
    /// A control-channel message.
    Control(ControlMessage),
}

/// Per-connection client state: everything needed to decide what to send
/// next and how to interpret what arrives, independent of the transport.
#[derive(Debug)]
pub struct ClientSession {
    state: ConnectionStateMachine,
    outbound: OutboundQueue,
    debouncer: NudgeDebouncer,
    rate_limiter: RateLimiter,
}

impl Default for ClientSession {
    fn default() -> Self {
        Self::new()
    }
}

impl ClientSession {
    /// Creates a session with the default queue capacity and rate-limit
    /// budget (`spec.md` §4.7 defaults).
    #[must_use]
    pub fn new() -> Self {
        Self {
            state: ConnectionStateMachine::new(),
            outbound: OutboundQueue::new(DEFAULT_CAPACITY),
            debouncer: NudgeDebouncer::new(),
            rate_limiter: RateLimiter::default(),
        }
    }

    /// Current connection state.
    #[must_use]
    pub const fn state(&self) -> ConnectionState {
        self.state.state()
    }

    /// Mutable access to the connection state machine, for the transport
    /// layer to drive handshake/backoff transitions.
    pub fn state_machine_mut(&mut self) -> &mut ConnectionStateMachine {
        &mut self.state
    }

    /// Records a drag/nudge for later coalescing. Cheap; safe to call on
    /// every pointer-move event.
    pub fn nudge(&mut self, slot: Slot, position: Vec3) {
        self.debouncer.record(slot, position);
    }

    /// Queues a control message directly, bypassing the nudge debouncer.
    pub fn send_control(&mut self, message: ControlMessage) {
        let outcome = self.outbound.push(OutboundItem::Control(message));
        if outcome == PushOutcome::EvictedOldest {
            warn!("outbound queue full; evicted an older message to enqueue a control message");
        }
    }

    /// Moves any coalesced nudges into the outbound queue. Call this on the
    /// debounce interval (`spec.md` §4.7, 50 ms).
    pub fn flush_debounce(&mut self) {
        let (updates, dropped) = self.debouncer.drain();
        if dropped > 0 {
            debug!(dropped, "dropped excess nudges past the per-batch cap");
        }
        for update in updates {
            let outcome = self.outbound.push(OutboundItem::Nudge {
                slot: update.slot,
                position: update.position,
            });
            if outcome == PushOutcome::EvictedOldest {
                warn!(slot = update.slot.get(), "outbound queue full; evicted an older message for a nudge");
            }
        }
    }

    /// Returns the next item to send, if the rate limiter currently
    /// permits a send. Leaves the item queued if the budget is exhausted;
    /// the caller should retry on its next tick.
    pub fn poll_outbound(&mut self, now: Instant) -> Option<OutboundItem> {
        if self.outbound.is_empty() {
            return None;
        }
        if !self.rate_limiter.try_acquire(now) {
            return None;
        }
        self.outbound.pop()
    }

    /// Decodes an inbound binary frame (decompressing first, per the
    /// compression gate).
    ///
    /// # Errors
    ///
    /// Returns [`ProtoError::MalformedFrame`] if the decompressed length is
    /// not a multiple of the record size.
    pub fn handle_binary(bytes: &[u8]) -> Result<ClientEvent, ProtoError> {
        let raw = decompress_frame(bytes);
        let (records, report) = decode_record_frame(&raw)?;
        Ok(ClientEvent::Snapshot { records, report })
    }

    /// Parses an inbound control-channel text frame, advancing the
    /// connection state machine to `Ready` on `connection_established`.
    ///
    /// # Errors
    ///
    /// Returns an error if `text` is not well-formed JSON.
    pub fn handle_text(&mut self, text: &str) -> Result<ClientEvent, serde_json::Error> {
        let message = ControlMessage::from_text(text)?;
        if matches!(message, ControlMessage::ConnectionEstablished { .. }) {
            self.state.mark_ready();
        }
        Ok(ClientEvent::Control(message))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn connection_established_advances_state_to_ready() {
        let mut session = ClientSession::new();
        session.state_machine_mut().begin_connecting();
        session.state_machine_mut().mark_connected();
        let text = r#"{"type":"connection_established","timestamp":1}"#;
        session.handle_text(text).unwrap();
        assert_eq!(session.state(), ConnectionState::Ready);
    }

    #[test]
    fn nudges_are_coalesced_then_flushed_to_the_outbound_queue() {
        let mut session = ClientSession::new();
        session.nudge(Slot::new(1), Vec3::new(1.0, 0.0, 0.0));
        session.nudge(Slot::new(1), Vec3::new(2.0, 0.0, 0.0));
        assert!(session.outbound.is_empty());
        session.flush_debounce();
        assert_eq!(session.outbound.len(), 1);

        let now = Instant::now();
        let item = session.poll_outbound(now).unwrap();
        assert_eq!(
            item,
            OutboundItem::Nudge {
                slot: Slot::new(1),
                position: Vec3::new(2.0, 0.0, 0.0),
            }
        );
    }

    #[test]
    fn binary_frames_round_trip_through_the_compression_gate() {
        let record = NodeRecord {
            slot: Slot::new(3),
            position: Vec3::new(1.0, 2.0, 3.0),
            velocity: Vec3::new(0.0, 0.0, 0.0),
        };
        let frame = graphstream_proto::encode_record_frame(&[record]);
        let event = ClientSession::handle_binary(&frame).unwrap();
        let ClientEvent::Snapshot { records, report } = event else {
            unreachable!("encode_record_frame always decodes back to a snapshot event");
        };
        assert_eq!(records, vec![record]);
        assert_eq!(report.record_count, 1);
    }
}
