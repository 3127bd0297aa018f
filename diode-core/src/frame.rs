//! On-wire datagram framing.
//!
//! One UDP datagram carries exactly one frame: an FEC-encoded chunk
//! plus the placement metadata the receiver needs to reassemble it,
//! with no external state. All integers are big-endian.
//!
//! ```text
//! Offset  Size  Field
//! ──────  ────  ──────────────
//!   0       4   total_chunks   u32, ≥ 1, same across a message
//!   4       4   chunk_index    u32, 0-based, < total_chunks
//!   8       2   copy_count     u16, ≥ 1
//!  10       2   copy_index     u16, 1-based, ≤ copy_count
//!  12       6   msg_tag        lowercase-hex ASCII
//!  18       2   chunk_tag      lowercase-hex ASCII
//!  20       2   payload_len    u16
//!  22       …   payload        FEC-encoded chunk bytes
//! ──────  ────  ──────────────
//! Header: 22 bytes
//! ```

use bytes::Bytes;

use crate::error::DiodeError;
use crate::tag::{CHUNK_TAG_LEN, ChunkTag, MSG_TAG_LEN, MsgTag};

/// Fixed size of the on-wire frame header.
pub const FRAME_HEADER_SIZE: usize = 22;

/// Receive buffer size; every legal frame fits with room to spare.
pub const MAX_DATAGRAM_SIZE: usize = 4096;

/// Maximum encoded-chunk payload a frame may carry.
pub const MAX_PAYLOAD_SIZE: usize = MAX_DATAGRAM_SIZE - FRAME_HEADER_SIZE;

/// A fully parsed frame — one encoded chunk plus placement metadata.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// Number of chunks in the whole message.
    pub total_chunks: u32,
    /// 0-based position of this chunk within the message.
    pub chunk_index: u32,
    /// Whole-message redundant copies the sender will emit.
    pub copy_count: u16,
    /// 1-based index of the copy this frame belongs to (informational).
    pub copy_index: u16,
    /// Groups frames of the same message.
    pub msg_tag: MsgTag,
    /// Integrity check for the decoded chunk.
    pub chunk_tag: ChunkTag,
    /// FEC-encoded chunk bytes.
    pub payload: Bytes,
}

impl Frame {
    /// Serialize to one datagram's worth of bytes.
    pub fn encode(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(FRAME_HEADER_SIZE + self.payload.len());
        buf.extend_from_slice(&self.total_chunks.to_be_bytes());
        buf.extend_from_slice(&self.chunk_index.to_be_bytes());
        buf.extend_from_slice(&self.copy_count.to_be_bytes());
        buf.extend_from_slice(&self.copy_index.to_be_bytes());
        buf.extend_from_slice(self.msg_tag.as_bytes());
        buf.extend_from_slice(self.chunk_tag.as_bytes());
        buf.extend_from_slice(&(self.payload.len() as u16).to_be_bytes());
        buf.extend_from_slice(&self.payload);
        buf
    }

    /// Parse a datagram into a frame, rejecting anything malformed.
    pub fn decode(data: &[u8]) -> Result<Self, DiodeError> {
        if data.len() < FRAME_HEADER_SIZE {
            return Err(DiodeError::FrameParse("datagram shorter than frame header"));
        }

        let total_chunks = u32::from_be_bytes(data[0..4].try_into().unwrap());
        let chunk_index = u32::from_be_bytes(data[4..8].try_into().unwrap());
        let copy_count = u16::from_be_bytes(data[8..10].try_into().unwrap());
        let copy_index = u16::from_be_bytes(data[10..12].try_into().unwrap());
        let msg_tag = MsgTag::from_wire(&data[12..12 + MSG_TAG_LEN])?;
        let chunk_tag = ChunkTag::from_wire(&data[18..18 + CHUNK_TAG_LEN])?;
        let payload_len = u16::from_be_bytes(data[20..22].try_into().unwrap()) as usize;

        if total_chunks == 0 {
            return Err(DiodeError::FrameParse("zero chunk count"));
        }
        if chunk_index >= total_chunks {
            return Err(DiodeError::FrameParse("chunk index out of range"));
        }
        if copy_count == 0 {
            return Err(DiodeError::FrameParse("zero copy count"));
        }
        if copy_index == 0 || copy_index > copy_count {
            return Err(DiodeError::FrameParse("copy index out of range"));
        }
        if payload_len == 0 {
            return Err(DiodeError::FrameParse("empty payload"));
        }
        if payload_len > MAX_PAYLOAD_SIZE {
            return Err(DiodeError::FrameParse("payload exceeds frame limit"));
        }
        if data.len() != FRAME_HEADER_SIZE + payload_len {
            return Err(DiodeError::FrameParse("payload length mismatch"));
        }

        Ok(Self {
            total_chunks,
            chunk_index,
            copy_count,
            copy_index,
            msg_tag,
            chunk_tag,
            payload: Bytes::copy_from_slice(&data[FRAME_HEADER_SIZE..]),
        })
    }
}
