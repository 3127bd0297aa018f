//! MD5-derived content fingerprints.
//!
//! Two short lowercase-hex suffixes of an MD5 hexdigest travel in every
//! frame: the message tag groups frames belonging to one message, and
//! the chunk tag checks a chunk's integrity after FEC decoding. MD5 is
//! a fingerprint here, not a security boundary.

use std::fmt;

use md5::{Digest, Md5};

use crate::error::DiodeError;

/// Wire length of a message tag (hex characters).
pub const MSG_TAG_LEN: usize = 6;

/// Wire length of a chunk tag (hex characters).
pub const CHUNK_TAG_LEN: usize = 2;

/// The last 6 hex characters of a whole-message MD5 hexdigest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MsgTag([u8; MSG_TAG_LEN]);

/// The last 2 hex characters of a chunk MD5 hexdigest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ChunkTag([u8; CHUNK_TAG_LEN]);

fn is_lower_hex(bytes: &[u8]) -> bool {
    bytes
        .iter()
        .all(|b| b.is_ascii_digit() || (b'a'..=b'f').contains(b))
}

impl MsgTag {
    /// Fingerprint a whole message.
    pub fn of(message: &[u8]) -> Self {
        let digest = Md5::digest(message);
        let mut tag = [0u8; MSG_TAG_LEN];
        hex::encode_to_slice(&digest[13..16], &mut tag).expect("6 hex chars from 3 bytes");
        Self(tag)
    }

    /// Parse a tag received off the wire.
    pub fn from_wire(bytes: &[u8]) -> Result<Self, DiodeError> {
        let tag: [u8; MSG_TAG_LEN] = bytes
            .try_into()
            .map_err(|_| DiodeError::FrameParse("message tag length"))?;
        if !is_lower_hex(&tag) {
            return Err(DiodeError::FrameParse("message tag is not lowercase hex"));
        }
        Ok(Self(tag))
    }

    /// The raw ASCII hex bytes.
    pub fn as_bytes(&self) -> &[u8; MSG_TAG_LEN] {
        &self.0
    }
}

impl ChunkTag {
    /// Fingerprint a single decoded chunk.
    pub fn of(chunk: &[u8]) -> Self {
        let digest = Md5::digest(chunk);
        let mut tag = [0u8; CHUNK_TAG_LEN];
        hex::encode_to_slice(&digest[15..16], &mut tag).expect("2 hex chars from 1 byte");
        Self(tag)
    }

    /// Parse a tag received off the wire.
    pub fn from_wire(bytes: &[u8]) -> Result<Self, DiodeError> {
        let tag: [u8; CHUNK_TAG_LEN] = bytes
            .try_into()
            .map_err(|_| DiodeError::FrameParse("chunk tag length"))?;
        if !is_lower_hex(&tag) {
            return Err(DiodeError::FrameParse("chunk tag is not lowercase hex"));
        }
        Ok(Self(tag))
    }

    /// The raw ASCII hex bytes.
    pub fn as_bytes(&self) -> &[u8; CHUNK_TAG_LEN] {
        &self.0
    }
}

impl fmt::Display for MsgTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Always valid ASCII by construction.
        f.write_str(&String::from_utf8_lossy(&self.0))
    }
}

impl fmt::Display for ChunkTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&String::from_utf8_lossy(&self.0))
    }
}
