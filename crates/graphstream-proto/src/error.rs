// SPDX-License-Identifier: Apache-2.0
//! Error types surfaced by frame decoding.

/// Failures that can arise while decoding a binary frame.
///
/// Per the concurrency model, a malformed frame is recovered locally: the
/// offending frame is dropped and the session stays open. This type never
/// represents a fatal condition on its own.
#[derive(Debug, Clone, thiserror::Error, PartialEq, Eq)]
pub enum ProtoError {
    /// The frame's byte length is not a multiple of the 28-byte record size.
    #[error("frame length {len} is not a multiple of the 28-byte record size")]
    MalformedFrame {
        /// The offending length, in bytes.
        len: usize,
    },
}
