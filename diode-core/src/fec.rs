//! Reed–Solomon forward error correction for chunks.
//!
//! Every chunk is encoded with a fixed parity budget of 4 bytes so the
//! receiver can repair bounded corruption without a return channel.
//!
//! GF(2^8) codewords are capped at 255 bytes, so chunks larger than
//! 251 bytes are segmented: each segment of up to 251 data bytes forms
//! its own codeword with 4 parity bytes appended. The encoded length is
//! therefore `len + 4 * ceil(len / 251)`, which is `len + 4` for the
//! common sub-251-byte case. Sender and receiver must use the same
//! parameters.

use reed_solomon::{Decoder, Encoder};

use crate::error::DiodeError;

/// Parity bytes appended per codeword.
pub const PARITY_BYTES: usize = 4;

/// Byte errors correctable per codeword.
pub const CORRECTABLE_ERRORS: usize = PARITY_BYTES / 2;

const CODEWORD_LEN: usize = 255;
const SEGMENT_DATA_LEN: usize = CODEWORD_LEN - PARITY_BYTES;

/// Encoded length of a chunk of `chunk_len` bytes.
pub fn encoded_len(chunk_len: usize) -> usize {
    chunk_len + PARITY_BYTES * chunk_len.div_ceil(SEGMENT_DATA_LEN)
}

/// Systematic Reed–Solomon codec with precomputed tables.
///
/// Pure and stateless between calls; safe to reuse for every chunk.
pub struct FecCodec {
    encoder: Encoder,
    decoder: Decoder,
}

impl FecCodec {
    pub fn new() -> Self {
        Self {
            encoder: Encoder::new(PARITY_BYTES),
            decoder: Decoder::new(PARITY_BYTES),
        }
    }

    /// Encode a chunk, appending parity to each internal segment.
    pub fn encode(&self, chunk: &[u8]) -> Vec<u8> {
        let mut encoded = Vec::with_capacity(encoded_len(chunk.len()));
        for segment in chunk.chunks(SEGMENT_DATA_LEN) {
            encoded.extend_from_slice(&self.encoder.encode(segment));
        }
        encoded
    }

    /// Decode an encoded chunk, correcting up to [`CORRECTABLE_ERRORS`]
    /// byte errors per segment.
    ///
    /// Fails with [`DiodeError::UnrecoverableCorruption`] when any
    /// segment carries more errors than the parity budget can repair.
    pub fn decode(&self, encoded: &[u8]) -> Result<Vec<u8>, DiodeError> {
        let mut chunk = Vec::with_capacity(encoded.len());
        for segment in encoded.chunks(CODEWORD_LEN) {
            if segment.len() <= PARITY_BYTES {
                return Err(DiodeError::UnrecoverableCorruption);
            }
            let corrected = self
                .decoder
                .correct(segment, None)
                .map_err(|_| DiodeError::UnrecoverableCorruption)?;
            chunk.extend_from_slice(corrected.data());
        }
        Ok(chunk)
    }
}

impl Default for FecCodec {
    fn default() -> Self {
        Self::new()
    }
}
