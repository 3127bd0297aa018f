//! # diode-core
//!
//! Core pipeline library for a one-way ("data diode") UDP message
//! transport: opaque byte messages move from a producer queue, across
//! a unidirectional UDP link, into a consumer queue, with no return
//! channel. Loss and corruption are absorbed up front by per-chunk
//! Reed–Solomon parity and whole-message redundant copies; the
//! receiver reassembles, validates, and de-duplicates.
//!
//! This crate contains:
//! - **Chunker**: fixed-max-size split and ordered rejoin
//! - **FEC codec**: Reed–Solomon encode/decode with a fixed parity budget
//! - **Tags**: MD5-derived message and chunk fingerprints
//! - **Framer**: the self-describing on-wire datagram layout
//! - **Reassembly / Dedup**: the receiver's two state tables
//! - **Pipelines**: `Sender` and `Receiver` cooperative loops
//! - **Queues**: the `MessageQueue` seam with Redis and in-memory drivers
//! - **Error**: `DiodeError` — typed, `thiserror`-based error hierarchy

pub mod chunk;
pub mod dedup;
pub mod error;
pub mod fec;
pub mod frame;
pub mod queue;
pub mod reassembly;
pub mod receiver;
pub mod sender;
pub mod tag;

// ── Re-exports for ergonomic usage ───────────────────────────────

pub use chunk::DEFAULT_CHUNK_SIZE;
pub use dedup::DedupTable;
pub use error::{DiodeError, QueueError};
pub use fec::{FecCodec, PARITY_BYTES};
pub use frame::{FRAME_HEADER_SIZE, Frame, MAX_DATAGRAM_SIZE};
pub use queue::{MemoryQueue, MessageQueue, RedisEndpoint, RedisQueue};
pub use reassembly::ReassemblyTable;
pub use receiver::{Receiver, ReceiverConfig, ReceiverStats};
pub use sender::{EncodedMessage, Sender, SenderConfig, SenderStats};
pub use tag::{ChunkTag, MsgTag};
