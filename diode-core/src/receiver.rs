//! Receiver pipeline: UDP → parse → validate → reassemble → dedup → sink queue.
//!
//! A single cooperative loop blocks on the socket. Frame parsing,
//! FEC validation, slot bookkeeping, duplicate suppression, and expiry
//! of stale state all happen inline on each arrival. Both state tables
//! are plain fields of the loop owner, so no locking is needed
//! anywhere.

use std::net::SocketAddr;
use std::time::{Duration, Instant};

use bytes::Bytes;
use tokio::net::UdpSocket;
use tracing::{debug, info, warn};

use crate::dedup::{DEDUP_SOFT_LIMIT, DEDUP_TTL, DedupTable};
use crate::error::DiodeError;
use crate::fec::FecCodec;
use crate::frame::{Frame, MAX_DATAGRAM_SIZE};
use crate::queue::{self, MessageQueue};
use crate::reassembly::{Arrival, Insert, ReassemblyTable, SLOT_SOFT_LIMIT, SLOT_TTL};
use crate::tag::ChunkTag;

/// Tuning for the receiver pipeline.
#[derive(Debug, Clone)]
pub struct ReceiverConfig {
    /// Name of the sink queue completed messages are pushed to.
    pub sink_queue: String,
    /// Live reassembly slots tolerated before housekeeping.
    pub slot_soft_limit: usize,
    /// Idle age at which a partial slot is abandoned.
    pub slot_ttl: Duration,
    /// Dedup entries tolerated before housekeeping.
    pub dedup_soft_limit: usize,
    /// Age at which a delivery record is forgotten. Must cover the
    /// span over which all redundant copies of a message can arrive.
    pub dedup_ttl: Duration,
}

impl Default for ReceiverConfig {
    fn default() -> Self {
        Self {
            sink_queue: "diode_in".into(),
            slot_soft_limit: SLOT_SOFT_LIMIT,
            slot_ttl: SLOT_TTL,
            dedup_soft_limit: DEDUP_SOFT_LIMIT,
            dedup_ttl: DEDUP_TTL,
        }
    }
}

/// Counters for the receiver loop.
#[derive(Debug, Default)]
pub struct ReceiverStats {
    pub frames_received: u64,
    pub parse_errors: u64,
    pub corrupt_chunks: u64,
    pub inconsistent_frames: u64,
    pub messages_delivered: u64,
    pub duplicates_suppressed: u64,
    pub assemblies_failed: u64,
    pub slots_expired: u64,
}

/// The receiving half of the diode.
pub struct Receiver<Q> {
    socket: UdpSocket,
    queue: Q,
    codec: FecCodec,
    reassembly: ReassemblyTable,
    dedup: DedupTable,
    config: ReceiverConfig,
    stats: ReceiverStats,
}

impl<Q: MessageQueue> Receiver<Q> {
    /// Bind the listening UDP socket. A bind failure is fatal.
    pub async fn bind(
        bind_addr: &str,
        queue: Q,
        config: ReceiverConfig,
    ) -> Result<Self, DiodeError> {
        let socket = UdpSocket::bind(bind_addr).await?;
        info!(addr = %socket.local_addr()?, "receiver listening");
        Ok(Self {
            socket,
            queue,
            codec: FecCodec::new(),
            reassembly: ReassemblyTable::new(config.slot_soft_limit, config.slot_ttl),
            dedup: DedupTable::new(config.dedup_soft_limit, config.dedup_ttl),
            config,
            stats: ReceiverStats::default(),
        })
    }

    /// The bound socket address, useful with an OS-assigned port.
    pub fn local_addr(&self) -> Result<SocketAddr, DiodeError> {
        Ok(self.socket.local_addr()?)
    }

    pub fn stats(&self) -> &ReceiverStats {
        &self.stats
    }

    /// Reassembly slots currently open.
    pub fn open_slots(&self) -> usize {
        self.reassembly.len()
    }

    /// Delivery records currently held against duplicates.
    pub fn dedup_entries(&self) -> usize {
        self.dedup.len()
    }

    /// Receive datagrams forever.
    ///
    /// Returns only on a fatal error: the socket dying or the sink
    /// queue staying unreachable through the bounded retry policy.
    pub async fn run(&mut self) -> Result<(), DiodeError> {
        let mut buf = vec![0u8; MAX_DATAGRAM_SIZE];
        loop {
            let (len, _peer) = self.socket.recv_from(&mut buf).await?;
            if let Some(message) = self.ingest(&buf[..len], Instant::now()) {
                queue::push_with_retry(&mut self.queue, &self.config.sink_queue, &message)
                    .await?;
                self.stats.messages_delivered += 1;
                if self.stats.messages_delivered % 100 == 0 {
                    info!(
                        delivered = self.stats.messages_delivered,
                        duplicates = self.stats.duplicates_suppressed,
                        parse_errors = self.stats.parse_errors,
                        "receiver progress"
                    );
                }
            }
        }
    }

    /// Process one datagram.
    ///
    /// Returns a completed, deduplicated message ready for the sink
    /// queue when this datagram finished one; `None` otherwise.
    pub fn ingest(&mut self, datagram: &[u8], now: Instant) -> Option<Vec<u8>> {
        self.stats.frames_received += 1;
        let delivery = self.process(datagram, now);
        self.housekeep(now);
        delivery
    }

    fn process(&mut self, datagram: &[u8], now: Instant) -> Option<Vec<u8>> {
        let frame = match Frame::decode(datagram) {
            Ok(frame) => frame,
            Err(e) => {
                self.stats.parse_errors += 1;
                debug!(error = %e, len = datagram.len(), "dropping unparseable datagram");
                return None;
            }
        };

        let arrival = match self.validate_chunk(&frame) {
            Ok(chunk) => Arrival::Valid(chunk),
            Err(e) => {
                self.stats.corrupt_chunks += 1;
                debug!(
                    tag = %frame.msg_tag,
                    chunk = frame.chunk_index,
                    error = %e,
                    "chunk failed validation"
                );
                Arrival::Corrupt
            }
        };

        match self.reassembly.insert(&frame, arrival, now) {
            Err(e) => {
                self.stats.inconsistent_frames += 1;
                debug!(tag = %frame.msg_tag, error = %e, "dropping inconsistent frame");
                None
            }
            Ok(Insert::Pending) | Ok(Insert::AlreadyValid) => None,
            Ok(Insert::Failed) => {
                self.stats.assemblies_failed += 1;
                warn!(
                    tag = %frame.msg_tag,
                    "assembly finished with corrupt chunks; dropped"
                );
                None
            }
            Ok(Insert::Complete(message)) => {
                if self.dedup.contains(&frame.msg_tag) {
                    self.stats.duplicates_suppressed += 1;
                    debug!(tag = %frame.msg_tag, "duplicate message suppressed");
                    None
                } else {
                    self.dedup.record(frame.msg_tag, now);
                    debug!(tag = %frame.msg_tag, bytes = message.len(), "message completed");
                    Some(message)
                }
            }
        }
    }

    /// FEC-decode the payload and check it against the chunk tag.
    fn validate_chunk(&self, frame: &Frame) -> Result<Bytes, DiodeError> {
        let decoded = self.codec.decode(&frame.payload)?;
        let computed = ChunkTag::of(&decoded);
        if computed != frame.chunk_tag {
            return Err(DiodeError::ChunkTagMismatch {
                expected: frame.chunk_tag,
                computed,
            });
        }
        Ok(Bytes::from(decoded))
    }

    /// Opportunistic expiry, piggy-backed on frame arrivals.
    fn housekeep(&mut self, now: Instant) {
        if self.reassembly.over_limit() {
            let expired = self.reassembly.purge_expired(now);
            let evicted = self.reassembly.evict_over_limit();
            self.stats.slots_expired += (expired + evicted) as u64;
            if expired + evicted > 0 {
                debug!(expired, evicted, "purged reassembly slots");
            }
        }
        if self.dedup.over_limit() {
            let expired = self.dedup.purge_expired(now);
            let evicted = self.dedup.evict_over_limit();
            if expired + evicted > 0 {
                debug!(expired, evicted, "purged dedup entries");
            }
        }
    }
}
