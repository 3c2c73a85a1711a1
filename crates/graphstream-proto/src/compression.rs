// SPDX-License-Identifier: Apache-2.0
//! Threshold-gated deflate wrapper around an encoded binary frame.
//!
//! There is no explicit compression flag on the wire: a frame at or below
//! [`DEFAULT_COMPRESSION_THRESHOLD`] bytes is sent raw, and a receiver tries
//! decompression first, falling back to treating the bytes as raw on
//! failure or on a decompressed length that doesn't land on a 28-byte
//! boundary.

use crate::codec::RECORD_LEN;
use flate2::read::ZlibDecoder;
use flate2::write::ZlibEncoder;
use flate2::Compression;
use std::io::{Read, Write};

/// Frames at or below this size are never compressed.
pub const DEFAULT_COMPRESSION_THRESHOLD: usize = 1024;

/// Compresses `body` if it exceeds `threshold`, otherwise returns it
/// unchanged.
#[must_use]
pub fn encode_frame(body: &[u8], threshold: usize) -> Vec<u8> {
    if body.len() <= threshold {
        return body.to_vec();
    }

    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
    // An encoder over an in-memory Vec only fails on allocation failure,
    // which we cannot recover from here either way.
    if encoder.write_all(body).is_err() {
        return body.to_vec();
    }
    match encoder.finish() {
        Ok(compressed) => compressed,
        Err(_) => body.to_vec(),
    }
}

/// Attempts to decompress `bytes`; falls back to treating `bytes` as an
/// already-raw frame if decompression fails or the result isn't a multiple
/// of the record size.
#[must_use]
pub fn decode_frame(bytes: &[u8]) -> Vec<u8> {
    let mut decoder = ZlibDecoder::new(bytes);
    let mut out = Vec::new();
    match decoder.read_to_end(&mut out) {
        Ok(_) if out.len() % RECORD_LEN == 0 => out,
        _ => bytes.to_vec(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn small_frames_pass_through_unchanged() {
        let body = vec![1u8; DEFAULT_COMPRESSION_THRESHOLD];
        assert_eq!(
            encode_frame(&body, DEFAULT_COMPRESSION_THRESHOLD),
            body
        );
    }

    #[test]
    fn large_frames_round_trip_through_compression() {
        let body = vec![0u8; RECORD_LEN * 200];
        let compressed = encode_frame(&body, DEFAULT_COMPRESSION_THRESHOLD);
        assert_ne!(compressed, body);
        assert_eq!(decode_frame(&compressed), body);
    }

    #[test]
    fn corrupt_compressed_input_falls_back_to_raw() {
        let garbage = vec![0xffu8; RECORD_LEN * 3];
        assert_eq!(decode_frame(&garbage), garbage);
    }

    #[test]
    fn uncompressed_small_frame_survives_a_decode_attempt() {
        // A frame at/below the threshold was never compressed, so a
        // receiver that still tries to decompress it must fall back to the
        // raw bytes rather than erroring.
        let body = vec![3u8; RECORD_LEN * 2];
        assert_eq!(decode_frame(&body), body);
    }
}
