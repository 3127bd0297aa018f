//! Domain-specific error types for the diode transport.
//!
//! All fallible operations return `Result<T, DiodeError>`.
//! No panics on malformed input: a datagram off the wire can be
//! anything, and every rejection is typed.

use thiserror::Error;

use crate::tag::ChunkTag;

/// The canonical error type for the diode transport.
#[derive(Debug, Error)]
pub enum DiodeError {
    // ── Wire errors ──────────────────────────────────────────────
    /// A datagram could not be parsed into a frame.
    #[error("frame parse error: {0}")]
    FrameParse(&'static str),

    /// FEC decoding failed: more byte errors than the parity budget
    /// can correct.
    #[error("chunk corruption beyond parity budget")]
    UnrecoverableCorruption,

    /// The decoded chunk does not hash to the tag carried in the frame.
    #[error("chunk tag mismatch: frame says {expected}, decoded bytes hash to {computed}")]
    ChunkTagMismatch {
        expected: ChunkTag,
        computed: ChunkTag,
    },

    // ── Reassembly errors ────────────────────────────────────────
    /// A frame's chunk count disagrees with the open slot for its tag.
    #[error("chunk count disagrees with open slot: slot expects {expected}, frame says {got}")]
    SlotInconsistent { expected: u32, got: u32 },

    /// A join was attempted while a chunk position was still empty.
    #[error("cannot join message: position {index} is empty")]
    IncompleteAssembly { index: usize },

    // ── Edge errors ──────────────────────────────────────────────
    /// The queue layer failed.
    #[error("queue error: {0}")]
    Queue(#[from] QueueError),

    /// The UDP socket layer reported an error.
    #[error("socket error: {0}")]
    Io(#[from] std::io::Error),
}

// ── QueueError ────────────────────────────────────────────────────

/// Typed error for the durable queues at either edge of the diode.
#[derive(Debug, Error)]
pub enum QueueError {
    /// The Redis backend rejected an operation.
    #[error("redis backend: {0}")]
    Redis(#[from] redis::RedisError),

    /// The queue stayed unreachable through the bounded retry policy.
    #[error("queue unavailable after {attempts} attempts: {reason}")]
    Unavailable { attempts: u32, reason: String },
}
