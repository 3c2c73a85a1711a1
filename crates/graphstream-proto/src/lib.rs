// SPDX-License-Identifier: Apache-2.0
//! Wire schema for the graph streaming engine: the binary node-record
//! codec, the compression gate wrapped around it, and the JSON control
//! channel multiplexed on the same transport.
//!
//! This crate is transport-agnostic: it knows nothing about WebSockets,
//! `axum`, or `tokio`. `graphstream-server` and `graphstream-client` drive
//! it over whatever transport they use.

mod codec;
mod compression;
mod control;
mod error;

pub use codec::{decode_frame as decode_record_frame, encode_frame as encode_record_frame};
pub use codec::{DecodeReport, NodeRecord, RECORD_LEN};
pub use compression::{
    decode_frame as decompress_frame, encode_frame as compress_frame,
    DEFAULT_COMPRESSION_THRESHOLD,
};
pub use control::ControlMessage;
pub use error::ProtoError;
