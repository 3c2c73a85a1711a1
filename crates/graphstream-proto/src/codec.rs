// SPDX-License-Identifier: Apache-2.0
//! Bit-exact reader/writer for the 28-byte little-endian node record.
//!
//! Layout: `slot: u32`, `position.{x,y,z}: f32`, `velocity.{x,y,z}: f32`, all
//! little-endian regardless of host. A frame is the back-to-back
//! concatenation of zero or more records; there is no header or count
//! prefix, so the record count is derived from the byte length.

use crate::ProtoError;
use graphstream_graph::{Slot, Vec3};

/// Size in bytes of one encoded node record.
pub const RECORD_LEN: usize = 28;

/// A single decoded `(slot, position, velocity)` triple.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NodeRecord {
    /// Wire identity.
    pub slot: Slot,
    /// Position, metres.
    pub position: Vec3,
    /// Velocity, metres/tick.
    pub velocity: Vec3,
}

/// Summary of a decode pass, so callers can log once per frame instead of
/// once per record.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DecodeReport {
    /// Number of records decoded.
    pub record_count: usize,
    /// Whether any record needed NaN coercion or range clamping.
    pub clamped: bool,
}

/// Encodes one record into `out`, appending 28 bytes.
pub fn encode_record(out: &mut Vec<u8>, record: &NodeRecord) {
    out.extend_from_slice(&record.slot.get().to_le_bytes());
    out.extend_from_slice(&record.position.x.to_le_bytes());
    out.extend_from_slice(&record.position.y.to_le_bytes());
    out.extend_from_slice(&record.position.z.to_le_bytes());
    out.extend_from_slice(&record.velocity.x.to_le_bytes());
    out.extend_from_slice(&record.velocity.y.to_le_bytes());
    out.extend_from_slice(&record.velocity.z.to_le_bytes());
}

/// Encodes a full frame: the concatenation of every record in `records`. An
/// empty slice produces an empty (legal, no-op) frame.
#[must_use]
pub fn encode_frame(records: &[NodeRecord]) -> Vec<u8> {
    let mut out = Vec::with_capacity(records.len() * RECORD_LEN);
    for record in records {
        encode_record(&mut out, record);
    }
    out
}

/// Decodes a frame into records, clamping positions/velocities to the wire
/// invariants (coercing non-finite components to zero first).
///
/// # Errors
///
/// Returns [`ProtoError::MalformedFrame`] if `bytes.len()` is not a multiple
/// of [`RECORD_LEN`].
pub fn decode_frame(bytes: &[u8]) -> Result<(Vec<NodeRecord>, DecodeReport), ProtoError> {
    if bytes.len() % RECORD_LEN != 0 {
        return Err(ProtoError::MalformedFrame { len: bytes.len() });
    }

    let mut records = Vec::with_capacity(bytes.len() / RECORD_LEN);
    let mut clamped = false;
    for chunk in bytes.chunks_exact(RECORD_LEN) {
        let slot = Slot::new(read_u32(chunk, 0));
        let position = Vec3::new(read_f32(chunk, 4), read_f32(chunk, 8), read_f32(chunk, 12));
        let velocity = Vec3::new(read_f32(chunk, 16), read_f32(chunk, 20), read_f32(chunk, 24));

        let (position, pos_clamped) =
            position.clamp_reporting(graphstream_graph::POSITION_LIMIT);
        let (velocity, vel_clamped) =
            velocity.clamp_reporting(graphstream_graph::VELOCITY_LIMIT);
        clamped |= pos_clamped || vel_clamped;

        records.push(NodeRecord {
            slot,
            position,
            velocity,
        });
    }

    let report = DecodeReport {
        record_count: records.len(),
        clamped,
    };
    Ok((records, report))
}

fn read_u32(chunk: &[u8], offset: usize) -> u32 {
    let mut buf = [0u8; 4];
    buf.copy_from_slice(&chunk[offset..offset + 4]);
    u32::from_le_bytes(buf)
}

fn read_f32(chunk: &[u8], offset: usize) -> f32 {
    f32::from_bits(read_u32(chunk, offset))
}
