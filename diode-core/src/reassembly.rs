//! Per-message reassembly state.
//!
//! Each in-flight message owns one slot, keyed by its tag. Arrivals
//! fill chunk positions idempotently. A slot resolves the moment its
//! last empty position fills: to a complete message when every
//! position holds valid bytes, or to a failure when any position is
//! still a corrupt marker. Stale slots are purged by age.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use bytes::Bytes;

use crate::chunk;
use crate::error::DiodeError;
use crate::frame::Frame;
use crate::tag::MsgTag;

/// Live-slot count above which housekeeping runs.
pub const SLOT_SOFT_LIMIT: usize = 20;

/// Idle age after which a partial slot is abandoned.
///
/// Callers should tune this to roughly twice the time one full
/// redundant pass takes to send.
pub const SLOT_TTL: Duration = Duration::from_secs(30);

/// Verdict of per-chunk validation, performed before insertion.
#[derive(Debug)]
pub enum Arrival {
    /// FEC decode succeeded and the chunk tag matched.
    Valid(Bytes),
    /// FEC decode failed or the chunk tag mismatched.
    Corrupt,
}

/// Outcome of inserting one arrival into the table.
#[derive(Debug)]
pub enum Insert {
    /// Stored; the message is still incomplete.
    Pending,
    /// The position already held valid bytes; arrival ignored.
    AlreadyValid,
    /// Every position filled with valid bytes; the slot is consumed
    /// and the joined message returned.
    Complete(Vec<u8>),
    /// Every position filled but at least one is corrupt; the slot is
    /// dropped. Later copies may rebuild it from scratch.
    Failed,
}

/// One chunk position within a slot.
enum ChunkSlot {
    Empty,
    Valid(Bytes),
    Corrupt,
}

struct Slot {
    total: u32,
    chunks: Vec<ChunkSlot>,
    last_seen_at: Instant,
    /// Positions still empty; the slot resolves when this hits zero.
    empty: usize,
}

impl Slot {
    fn new(total: u32, now: Instant) -> Self {
        let total_usize = total as usize;
        let mut chunks = Vec::with_capacity(total_usize);
        chunks.resize_with(total_usize, || ChunkSlot::Empty);
        Self {
            total,
            chunks,
            last_seen_at: now,
            empty: total_usize,
        }
    }
}

/// All in-flight reassembly slots, owned by the receiver loop.
pub struct ReassemblyTable {
    slots: HashMap<MsgTag, Slot>,
    soft_limit: usize,
    ttl: Duration,
}

impl ReassemblyTable {
    pub fn new(soft_limit: usize, ttl: Duration) -> Self {
        Self {
            slots: HashMap::new(),
            soft_limit,
            ttl,
        }
    }

    /// Number of live slots.
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Whether the table has grown past its soft limit.
    pub fn over_limit(&self) -> bool {
        self.slots.len() > self.soft_limit
    }

    /// Insert one validated arrival.
    ///
    /// Creates the slot on the first frame for a tag, refreshes its
    /// idle timer, and applies the write rules: a valid position is
    /// never overwritten, and a valid arrival always replaces a
    /// corrupt marker.
    pub fn insert(
        &mut self,
        frame: &Frame,
        arrival: Arrival,
        now: Instant,
    ) -> Result<Insert, DiodeError> {
        if frame.chunk_index >= frame.total_chunks {
            return Err(DiodeError::FrameParse("chunk index out of range"));
        }
        let tag = frame.msg_tag;
        if let Some(slot) = self.slots.get(&tag) {
            if slot.total != frame.total_chunks {
                return Err(DiodeError::SlotInconsistent {
                    expected: slot.total,
                    got: frame.total_chunks,
                });
            }
        }

        let slot = self
            .slots
            .entry(tag)
            .or_insert_with(|| Slot::new(frame.total_chunks, now));
        slot.last_seen_at = now;

        let index = frame.chunk_index as usize;
        match &slot.chunks[index] {
            ChunkSlot::Valid(_) => return Ok(Insert::AlreadyValid),
            ChunkSlot::Empty => {
                slot.empty -= 1;
                slot.chunks[index] = match arrival {
                    Arrival::Valid(bytes) => ChunkSlot::Valid(bytes),
                    Arrival::Corrupt => ChunkSlot::Corrupt,
                };
            }
            ChunkSlot::Corrupt => {
                if let Arrival::Valid(bytes) = arrival {
                    slot.chunks[index] = ChunkSlot::Valid(bytes);
                }
            }
        }

        if slot.empty > 0 {
            return Ok(Insert::Pending);
        }

        // All positions filled: the slot resolves either way.
        let slot = self.slots.remove(&tag).expect("slot filled just above");
        let mut corrupt = false;
        let mut positions = Vec::with_capacity(slot.chunks.len());
        for position in slot.chunks {
            match position {
                ChunkSlot::Valid(bytes) => positions.push(Some(bytes)),
                _ => {
                    corrupt = true;
                    positions.push(None);
                }
            }
        }
        if corrupt {
            return Ok(Insert::Failed);
        }
        Ok(Insert::Complete(chunk::join(&positions)?))
    }

    /// Drop slots idle longer than the TTL. Returns how many were dropped.
    pub fn purge_expired(&mut self, now: Instant) -> usize {
        let before = self.slots.len();
        let ttl = self.ttl;
        self.slots
            .retain(|_, slot| now.duration_since(slot.last_seen_at) <= ttl);
        before - self.slots.len()
    }

    /// Evict the oldest slots until the table is back at its soft
    /// limit, keeping peak memory bounded even when nothing has aged
    /// out yet. Returns how many were evicted.
    pub fn evict_over_limit(&mut self) -> usize {
        let mut evicted = 0;
        while self.slots.len() > self.soft_limit {
            let oldest = self
                .slots
                .iter()
                .min_by_key(|(_, slot)| slot.last_seen_at)
                .map(|(tag, _)| *tag);
            match oldest {
                Some(tag) => {
                    self.slots.remove(&tag);
                    evicted += 1;
                }
                None => break,
            }
        }
        evicted
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tag::ChunkTag;

    fn frame_for(tag: MsgTag, total: u32, index: u32, chunk: &[u8]) -> Frame {
        Frame {
            total_chunks: total,
            chunk_index: index,
            copy_count: 2,
            copy_index: 1,
            msg_tag: tag,
            chunk_tag: ChunkTag::of(chunk),
            payload: Bytes::copy_from_slice(chunk), // stand-in; table never reads it
        }
    }

    fn valid(chunk: &[u8]) -> Arrival {
        Arrival::Valid(Bytes::copy_from_slice(chunk))
    }

    #[test]
    fn single_chunk_completes_immediately() {
        let mut table = ReassemblyTable::new(SLOT_SOFT_LIMIT, SLOT_TTL);
        let tag = MsgTag::of(b"m");
        let frame = frame_for(tag, 1, 0, b"payload");
        let outcome = table.insert(&frame, valid(b"payload"), Instant::now()).unwrap();
        match outcome {
            Insert::Complete(message) => assert_eq!(message, b"payload"),
            other => panic!("unexpected outcome: {other:?}"),
        }
        assert!(table.is_empty());
    }

    #[test]
    fn out_of_order_chunks_complete() {
        let mut table = ReassemblyTable::new(SLOT_SOFT_LIMIT, SLOT_TTL);
        let tag = MsgTag::of(b"m");
        let now = Instant::now();

        assert!(matches!(
            table.insert(&frame_for(tag, 3, 2, b"cc"), valid(b"cc"), now).unwrap(),
            Insert::Pending
        ));
        assert!(matches!(
            table.insert(&frame_for(tag, 3, 0, b"aa"), valid(b"aa"), now).unwrap(),
            Insert::Pending
        ));
        let outcome = table.insert(&frame_for(tag, 3, 1, b"bb"), valid(b"bb"), now).unwrap();
        match outcome {
            Insert::Complete(message) => assert_eq!(message, b"aabbcc"),
            other => panic!("unexpected outcome: {other:?}"),
        }
    }

    #[test]
    fn valid_position_never_overwritten() {
        let mut table = ReassemblyTable::new(SLOT_SOFT_LIMIT, SLOT_TTL);
        let tag = MsgTag::of(b"m");
        let now = Instant::now();

        table.insert(&frame_for(tag, 2, 0, b"aa"), valid(b"aa"), now).unwrap();
        // A second arrival for the same position is ignored, even corrupt.
        assert!(matches!(
            table.insert(&frame_for(tag, 2, 0, b"xx"), Arrival::Corrupt, now).unwrap(),
            Insert::AlreadyValid
        ));
        let outcome = table.insert(&frame_for(tag, 2, 1, b"bb"), valid(b"bb"), now).unwrap();
        match outcome {
            Insert::Complete(message) => assert_eq!(message, b"aabb"),
            other => panic!("unexpected outcome: {other:?}"),
        }
    }

    #[test]
    fn valid_arrival_replaces_corrupt_marker() {
        let mut table = ReassemblyTable::new(SLOT_SOFT_LIMIT, SLOT_TTL);
        let tag = MsgTag::of(b"m");
        let now = Instant::now();

        table.insert(&frame_for(tag, 2, 1, b"bb"), Arrival::Corrupt, now).unwrap();
        assert!(matches!(
            table.insert(&frame_for(tag, 2, 1, b"bb"), valid(b"bb"), now).unwrap(),
            Insert::Pending
        ));
        let outcome = table.insert(&frame_for(tag, 2, 0, b"aa"), valid(b"aa"), now).unwrap();
        assert!(matches!(outcome, Insert::Complete(_)));
    }

    #[test]
    fn all_filled_with_corrupt_fails_and_drops() {
        let mut table = ReassemblyTable::new(SLOT_SOFT_LIMIT, SLOT_TTL);
        let tag = MsgTag::of(b"m");
        let now = Instant::now();

        table.insert(&frame_for(tag, 2, 0, b"aa"), valid(b"aa"), now).unwrap();
        let outcome = table.insert(&frame_for(tag, 2, 1, b"bb"), Arrival::Corrupt, now).unwrap();
        assert!(matches!(outcome, Insert::Failed));
        assert!(table.is_empty());

        // A later full copy rebuilds the message from scratch.
        table.insert(&frame_for(tag, 2, 0, b"aa"), valid(b"aa"), now).unwrap();
        let outcome = table.insert(&frame_for(tag, 2, 1, b"bb"), valid(b"bb"), now).unwrap();
        assert!(matches!(outcome, Insert::Complete(_)));
    }

    #[test]
    fn disagreeing_chunk_count_rejected() {
        let mut table = ReassemblyTable::new(SLOT_SOFT_LIMIT, SLOT_TTL);
        let tag = MsgTag::of(b"m");
        let now = Instant::now();

        table.insert(&frame_for(tag, 3, 0, b"aa"), valid(b"aa"), now).unwrap();
        let err = table
            .insert(&frame_for(tag, 5, 1, b"bb"), valid(b"bb"), now)
            .unwrap_err();
        assert!(matches!(
            err,
            DiodeError::SlotInconsistent { expected: 3, got: 5 }
        ));
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn stale_slots_purged_by_age() {
        let mut table = ReassemblyTable::new(SLOT_SOFT_LIMIT, Duration::from_secs(5));
        let start = Instant::now();

        table
            .insert(&frame_for(MsgTag::of(b"old"), 2, 0, b"aa"), valid(b"aa"), start)
            .unwrap();
        table
            .insert(
                &frame_for(MsgTag::of(b"new"), 2, 0, b"aa"),
                valid(b"aa"),
                start + Duration::from_secs(4),
            )
            .unwrap();

        let dropped = table.purge_expired(start + Duration::from_secs(6));
        assert_eq!(dropped, 1);
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn eviction_keeps_newest_slots() {
        let mut table = ReassemblyTable::new(2, SLOT_TTL);
        let start = Instant::now();
        for (i, name) in [b"one" as &[u8], b"two", b"three", b"four"].iter().enumerate() {
            table
                .insert(
                    &frame_for(MsgTag::of(name), 2, 0, b"aa"),
                    valid(b"aa"),
                    start + Duration::from_secs(i as u64),
                )
                .unwrap();
        }
        assert_eq!(table.len(), 4);
        let evicted = table.evict_over_limit();
        assert_eq!(evicted, 2);
        assert_eq!(table.len(), 2);

        // The two most recent slots survive and can still complete.
        let outcome = table
            .insert(
                &frame_for(MsgTag::of(b"four"), 2, 1, b"bb"),
                valid(b"bb"),
                start + Duration::from_secs(10),
            )
            .unwrap();
        assert!(matches!(outcome, Insert::Complete(_)));
    }
}
