//! Sender pipeline: source queue → chunk → FEC → frame → UDP.
//!
//! A single cooperative loop pops one message at a time, encodes every
//! chunk once, and emits each frame as its own paced datagram; the
//! whole message is sent again for every redundant copy. The link is
//! one-way: there are no acknowledgements, and a failed send is logged
//! and dropped, never retried.

use std::net::SocketAddr;
use std::time::Duration;

use bytes::Bytes;
use tokio::net::UdpSocket;
use tracing::{debug, info, warn};

use crate::chunk::{self, DEFAULT_CHUNK_SIZE};
use crate::error::DiodeError;
use crate::fec::FecCodec;
use crate::frame::Frame;
use crate::queue::{self, MessageQueue};
use crate::tag::{ChunkTag, MsgTag};

/// Whole-message redundant copies emitted per message.
pub const DEFAULT_REDUNDANT_COPIES: u16 = 2;

/// Sleep between datagrams, so bursts do not overrun the receiver's
/// socket buffer on loopback and LAN links.
pub const DEFAULT_PACING: Duration = Duration::from_millis(1);

/// Sleep when the source queue is empty.
pub const DEFAULT_IDLE_SLEEP: Duration = Duration::from_secs(2);

/// Tuning for the sender pipeline.
#[derive(Debug, Clone)]
pub struct SenderConfig {
    /// Name of the source queue to drain.
    pub source_queue: String,
    /// Maximum chunk size in bytes.
    pub chunk_size: usize,
    /// Whole-message copies to emit (≥ 1).
    pub redundant_copies: u16,
    /// Delay between consecutive datagrams.
    pub pacing: Duration,
    /// Delay before re-polling an empty source queue.
    pub idle_sleep: Duration,
}

impl Default for SenderConfig {
    fn default() -> Self {
        Self {
            source_queue: "diode_out".into(),
            chunk_size: DEFAULT_CHUNK_SIZE,
            redundant_copies: DEFAULT_REDUNDANT_COPIES,
            pacing: DEFAULT_PACING,
            idle_sleep: DEFAULT_IDLE_SLEEP,
        }
    }
}

/// Counters for the sender loop.
#[derive(Debug, Default)]
pub struct SenderStats {
    pub messages_sent: u64,
    pub frames_sent: u64,
    pub send_errors: u64,
    pub empty_items_skipped: u64,
}

// ── EncodedMessage ───────────────────────────────────────────────

/// A message chunked, tagged, and FEC-encoded exactly once, ready to
/// be framed for any number of redundant copies.
pub struct EncodedMessage {
    msg_tag: MsgTag,
    chunks: Vec<EncodedChunk>,
}

struct EncodedChunk {
    chunk_tag: ChunkTag,
    payload: Bytes,
}

impl EncodedMessage {
    pub fn new(message: &Bytes, codec: &FecCodec, chunk_size: usize) -> Self {
        let msg_tag = MsgTag::of(message);
        let chunks = chunk::split(message, chunk_size)
            .into_iter()
            .map(|chunk| EncodedChunk {
                chunk_tag: ChunkTag::of(&chunk),
                payload: Bytes::from(codec.encode(&chunk)),
            })
            .collect();
        Self { msg_tag, chunks }
    }

    pub fn msg_tag(&self) -> MsgTag {
        self.msg_tag
    }

    pub fn total_chunks(&self) -> u32 {
        self.chunks.len() as u32
    }

    /// Build the frame for one (chunk, copy) pair. The encoded payload
    /// is shared, not re-encoded.
    pub fn frame(&self, chunk_index: u32, copy_index: u16, copy_count: u16) -> Frame {
        let chunk = &self.chunks[chunk_index as usize];
        Frame {
            total_chunks: self.total_chunks(),
            chunk_index,
            copy_count,
            copy_index,
            msg_tag: self.msg_tag,
            chunk_tag: chunk.chunk_tag,
            payload: chunk.payload.clone(),
        }
    }
}

// ── Sender ───────────────────────────────────────────────────────

/// The sending half of the diode.
pub struct Sender<Q> {
    socket: UdpSocket,
    target: SocketAddr,
    queue: Q,
    codec: FecCodec,
    config: SenderConfig,
    stats: SenderStats,
}

impl<Q: MessageQueue> Sender<Q> {
    /// Bind a local UDP socket aimed at `target`.
    pub async fn bind(
        local_addr: &str,
        target: SocketAddr,
        queue: Q,
        config: SenderConfig,
    ) -> Result<Self, DiodeError> {
        let socket = UdpSocket::bind(local_addr).await?;
        Ok(Self {
            socket,
            target,
            queue,
            codec: FecCodec::new(),
            config,
            stats: SenderStats::default(),
        })
    }

    pub fn stats(&self) -> &SenderStats {
        &self.stats
    }

    /// Drain the source queue forever.
    ///
    /// Returns only on a fatal error (source queue unreachable through
    /// the bounded retry policy).
    pub async fn run(&mut self) -> Result<(), DiodeError> {
        info!(
            target = %self.target,
            queue = %self.config.source_queue,
            copies = self.config.redundant_copies,
            "sender running"
        );
        loop {
            let item =
                queue::pop_with_retry(&mut self.queue, &self.config.source_queue).await?;
            let Some(item) = item else {
                tokio::time::sleep(self.config.idle_sleep).await;
                continue;
            };
            if item.is_empty() {
                self.stats.empty_items_skipped += 1;
                warn!("skipping zero-length item from source queue");
                continue;
            }

            self.send_message(Bytes::from(item)).await;
            self.stats.messages_sent += 1;
            if self.stats.messages_sent % 1000 == 0 {
                info!(
                    messages = self.stats.messages_sent,
                    frames = self.stats.frames_sent,
                    send_errors = self.stats.send_errors,
                    "sender progress"
                );
            }
        }
    }

    /// Emit every frame of one message, `redundant_copies` times over.
    pub async fn send_message(&mut self, message: Bytes) {
        let encoded = EncodedMessage::new(&message, &self.codec, self.config.chunk_size);
        let copies = self.config.redundant_copies.max(1);
        debug!(
            tag = %encoded.msg_tag(),
            bytes = message.len(),
            chunks = encoded.total_chunks(),
            copies,
            "sending message"
        );
        for copy_index in 1..=copies {
            for chunk_index in 0..encoded.total_chunks() {
                let datagram = encoded.frame(chunk_index, copy_index, copies).encode();
                match self.socket.send_to(&datagram, self.target).await {
                    Ok(_) => self.stats.frames_sent += 1,
                    Err(e) => {
                        self.stats.send_errors += 1;
                        warn!(
                            error = %e,
                            chunk = chunk_index,
                            copy = copy_index,
                            "datagram send failed; dropped"
                        );
                    }
                }
                tokio::time::sleep(self.config.pacing).await;
            }
        }
    }
}
