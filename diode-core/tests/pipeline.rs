//! Integration tests — the full chunk/FEC/frame/reassembly/dedup
//! pipeline driven frame by frame, plus an end-to-end run over a real
//! UDP socket pair on localhost.

use std::time::{Duration, Instant};

use bytes::Bytes;

use diode_core::fec::FecCodec;
use diode_core::frame::{FRAME_HEADER_SIZE, Frame};
use diode_core::queue::{MemoryQueue, MessageQueue};
use diode_core::receiver::{Receiver, ReceiverConfig};
use diode_core::sender::{EncodedMessage, Sender, SenderConfig};
use diode_core::tag::ChunkTag;

// ── Helpers ──────────────────────────────────────────────────────

/// A receiver on an ephemeral socket; tests drive `ingest` directly.
async fn test_receiver(config: ReceiverConfig) -> Receiver<MemoryQueue> {
    Receiver::bind("127.0.0.1:0", MemoryQueue::new(), config)
        .await
        .unwrap()
}

/// All frames of one message in sender emission order: every chunk of
/// copy 1, then every chunk of copy 2, and so on.
fn frames_for(message: &[u8], copies: u16) -> Vec<Frame> {
    let codec = FecCodec::new();
    let encoded = EncodedMessage::new(&Bytes::copy_from_slice(message), &codec, 1024);
    let mut frames = Vec::new();
    for copy_index in 1..=copies {
        for chunk_index in 0..encoded.total_chunks() {
            frames.push(encoded.frame(chunk_index, copy_index, copies));
        }
    }
    frames
}

fn patterned(len: usize) -> Vec<u8> {
    (0..len).map(|i| (i * 17 % 256) as u8).collect()
}

/// A well-formed chunk tag guaranteed to differ from `tag`, so a frame
/// carrying it always fails validation.
fn mismatching_tag(tag: ChunkTag) -> ChunkTag {
    let mut bytes = *tag.as_bytes();
    bytes[0] = if bytes[0] == b'0' { b'1' } else { b'0' };
    ChunkTag::from_wire(&bytes).unwrap()
}

// ── Scenarios ────────────────────────────────────────────────────

#[tokio::test]
async fn test_single_chunk_message_delivered_once() {
    let mut receiver = test_receiver(ReceiverConfig::default()).await;
    let frames = frames_for(b"hello world", 2);
    assert_eq!(frames.len(), 2);

    let now = Instant::now();
    let delivered = receiver.ingest(&frames[0].encode(), now);
    assert_eq!(delivered.unwrap(), b"hello world");

    // The second copy completes again but is suppressed as a duplicate.
    assert!(receiver.ingest(&frames[1].encode(), now).is_none());
    assert_eq!(receiver.stats().duplicates_suppressed, 1);
    assert_eq!(receiver.stats().frames_received, 2);
}

#[tokio::test]
async fn test_survives_losing_an_entire_copy() {
    let mut receiver = test_receiver(ReceiverConfig::default()).await;
    let message = patterned(2500);
    let frames = frames_for(&message, 2);
    assert_eq!(frames.len(), 6); // 3 chunks × 2 copies

    // Copy 1 (frames 0..3) is lost entirely; copy 2 arrives.
    let now = Instant::now();
    assert!(receiver.ingest(&frames[3].encode(), now).is_none());
    assert!(receiver.ingest(&frames[4].encode(), now).is_none());
    let delivered = receiver.ingest(&frames[5].encode(), now);
    assert_eq!(delivered.unwrap(), message);
}

#[tokio::test]
async fn test_interleaved_copies_with_partial_loss() {
    let mut receiver = test_receiver(ReceiverConfig::default()).await;
    let message = patterned(3000);
    let frames = frames_for(&message, 2);
    // frames: [c1/i0, c1/i1, c1/i2, c2/i0, c2/i1, c2/i2]

    let now = Instant::now();
    assert!(receiver.ingest(&frames[0].encode(), now).is_none()); // copy 1, chunk 0
    assert!(receiver.ingest(&frames[5].encode(), now).is_none()); // copy 2, chunk 2
    let delivered = receiver.ingest(&frames[1].encode(), now); // copy 1, chunk 1
    assert_eq!(delivered.unwrap(), message);

    // A straggler from copy 2 after delivery does not deliver again.
    assert!(receiver.ingest(&frames[3].encode(), now).is_none());
}

#[tokio::test]
async fn test_single_byte_corruption_repaired_in_place() {
    let mut receiver = test_receiver(ReceiverConfig::default()).await;
    let message = patterned(800);
    let frames = frames_for(&message, 1);
    assert_eq!(frames.len(), 1);

    let mut datagram = frames[0].encode();
    datagram[FRAME_HEADER_SIZE + 17] ^= 0xFF; // one byte inside the encoded chunk

    let delivered = receiver.ingest(&datagram, Instant::now());
    assert_eq!(delivered.unwrap(), message);
    assert_eq!(receiver.stats().corrupt_chunks, 0);
}

#[tokio::test]
async fn test_corrupt_chunk_in_one_copy_repaired_by_the_other() {
    let mut receiver = test_receiver(ReceiverConfig::default()).await;
    let message = patterned(1200); // 2 chunks
    let frames = frames_for(&message, 2);
    assert_eq!(frames.len(), 4);

    // Copy 1's second chunk fails validation: its decoded bytes no
    // longer hash to the tag it carries.
    let mut bad = frames[1].clone();
    bad.chunk_tag = mismatching_tag(frames[1].chunk_tag);

    let now = Instant::now();
    assert!(receiver.ingest(&frames[0].encode(), now).is_none());
    // Both positions now filled, one corrupt: the assembly is dropped.
    assert!(receiver.ingest(&bad.encode(), now).is_none());
    assert_eq!(receiver.stats().corrupt_chunks, 1);
    assert_eq!(receiver.stats().assemblies_failed, 1);

    // Copy 2 rebuilds the message intact.
    assert!(receiver.ingest(&frames[2].encode(), now).is_none());
    let delivered = receiver.ingest(&frames[3].encode(), now);
    assert_eq!(delivered.unwrap(), message);
}

#[tokio::test]
async fn test_corrupt_marker_overwritten_before_completion() {
    let mut receiver = test_receiver(ReceiverConfig::default()).await;
    let message = patterned(1200); // 2 chunks
    let frames = frames_for(&message, 2);

    let mut bad = frames[1].clone();
    bad.chunk_tag = mismatching_tag(frames[1].chunk_tag);

    let now = Instant::now();
    // Corrupt arrival first, then the same position from copy 2 wins.
    assert!(receiver.ingest(&bad.encode(), now).is_none());
    assert!(receiver.ingest(&frames[3].encode(), now).is_none());
    let delivered = receiver.ingest(&frames[0].encode(), now);
    assert_eq!(delivered.unwrap(), message);
    assert_eq!(receiver.stats().assemblies_failed, 0);
}

#[tokio::test]
async fn test_stale_partial_assembly_expires() {
    let config = ReceiverConfig {
        slot_soft_limit: 1,
        slot_ttl: Duration::from_secs(5),
        ..ReceiverConfig::default()
    };
    let mut receiver = test_receiver(config).await;

    let message = patterned(3000); // 3 chunks
    let frames = frames_for(&message, 1);
    let second = frames_for(&patterned(1500), 1); // 2 chunks, different tag
    let third = frames_for(&patterned(1600), 1); // 2 chunks, different tag

    // Two of three chunks arrive, then the message stalls.
    let start = Instant::now();
    assert!(receiver.ingest(&frames[0].encode(), start).is_none());
    assert!(receiver.ingest(&frames[1].encode(), start).is_none());
    assert_eq!(receiver.open_slots(), 1);

    // Past the TTL, an unrelated arrival pushes the table over its
    // limit; housekeeping purges the stale slot and that message is lost.
    let later = start + Duration::from_secs(6);
    assert!(receiver.ingest(&second[0].encode(), later).is_none());
    assert_eq!(receiver.stats().slots_expired, 1);
    assert_eq!(receiver.open_slots(), 1);

    // The last chunk of the expired message opens a fresh slot that
    // can never complete on its own.
    assert!(
        receiver
            .ingest(&frames[2].encode(), later + Duration::from_secs(1))
            .is_none()
    );
    assert_eq!(receiver.open_slots(), 1); // oldest partial evicted to stay at the cap

    // And it, too, eventually ages out under pressure.
    let much_later = later + Duration::from_secs(8);
    assert!(receiver.ingest(&third[0].encode(), much_later).is_none());
    assert_eq!(receiver.stats().slots_expired, 3);
    assert_eq!(receiver.open_slots(), 1);
}

// ── Properties ───────────────────────────────────────────────────

#[tokio::test]
async fn test_repeated_frame_leaves_state_unchanged() {
    let mut receiver = test_receiver(ReceiverConfig::default()).await;
    let message = patterned(1500); // 2 chunks
    let frames = frames_for(&message, 1);

    let now = Instant::now();
    assert!(receiver.ingest(&frames[0].encode(), now).is_none());
    assert!(receiver.ingest(&frames[0].encode(), now).is_none());
    assert!(receiver.ingest(&frames[0].encode(), now).is_none());
    assert_eq!(receiver.open_slots(), 1);

    let delivered = receiver.ingest(&frames[1].encode(), now);
    assert_eq!(delivered.unwrap(), message);
}

#[tokio::test]
async fn test_any_arrival_order_delivers_once() {
    let message = patterned(2600); // 3 chunks
    let permutations: [[usize; 3]; 6] = [
        [0, 1, 2],
        [0, 2, 1],
        [1, 0, 2],
        [1, 2, 0],
        [2, 0, 1],
        [2, 1, 0],
    ];

    for order in permutations {
        let mut receiver = test_receiver(ReceiverConfig::default()).await;
        let frames = frames_for(&message, 1);
        let now = Instant::now();

        let mut deliveries = Vec::new();
        for index in order {
            if let Some(delivered) = receiver.ingest(&frames[index].encode(), now) {
                deliveries.push(delivered);
            }
        }
        assert_eq!(deliveries.len(), 1, "order {order:?}");
        assert_eq!(deliveries[0], message, "order {order:?}");
    }
}

#[tokio::test]
async fn test_full_set_replayed_delivers_once() {
    let mut receiver = test_receiver(ReceiverConfig::default()).await;
    let message = patterned(2100); // 3 chunks
    let frames = frames_for(&message, 1);

    let now = Instant::now();
    let mut deliveries = 0;
    for _ in 0..2 {
        for frame in &frames {
            if receiver.ingest(&frame.encode(), now).is_some() {
                deliveries += 1;
            }
        }
    }
    assert_eq!(deliveries, 1);
    assert_eq!(receiver.stats().duplicates_suppressed, 1);
}

#[tokio::test]
async fn test_tables_stay_bounded() {
    let config = ReceiverConfig {
        dedup_soft_limit: 10,
        dedup_ttl: Duration::from_secs(3600),
        ..ReceiverConfig::default()
    };
    let mut receiver = test_receiver(config).await;

    let now = Instant::now();
    for i in 0..30u32 {
        let message = format!("message number {i}");
        let frames = frames_for(message.as_bytes(), 1);
        let delivered = receiver.ingest(&frames[0].encode(), now);
        assert_eq!(delivered.unwrap(), message.as_bytes());
    }

    // Every assembly completed, and the dedup ledger was evicted back
    // to its soft limit as it grew.
    assert_eq!(receiver.open_slots(), 0);
    assert!(receiver.dedup_entries() <= 11);
}

#[tokio::test]
async fn test_garbage_datagrams_only_bump_the_error_counter() {
    let mut receiver = test_receiver(ReceiverConfig::default()).await;
    let now = Instant::now();

    assert!(receiver.ingest(b"", now).is_none());
    assert!(receiver.ingest(b"not a frame", now).is_none());
    assert!(receiver.ingest(&[0xFFu8; 64], now).is_none());
    assert_eq!(receiver.stats().parse_errors, 3);
    assert_eq!(receiver.open_slots(), 0);

    // The pipeline still works afterwards.
    let frames = frames_for(b"still alive", 1);
    assert_eq!(
        receiver.ingest(&frames[0].encode(), now).unwrap(),
        b"still alive"
    );
}

#[tokio::test]
async fn test_mismatched_chunk_count_for_same_tag_dropped() {
    let mut receiver = test_receiver(ReceiverConfig::default()).await;
    let message = patterned(2100); // 3 chunks
    let frames = frames_for(&message, 1);

    let now = Instant::now();
    assert!(receiver.ingest(&frames[0].encode(), now).is_none());

    // Same tag, different claimed chunk count.
    let mut forged = frames[1].clone();
    forged.total_chunks = 9;
    assert!(receiver.ingest(&forged.encode(), now).is_none());
    assert_eq!(receiver.stats().inconsistent_frames, 1);

    // The honest frames still complete the message.
    assert!(receiver.ingest(&frames[1].encode(), now).is_none());
    let delivered = receiver.ingest(&frames[2].encode(), now);
    assert_eq!(delivered.unwrap(), message);
}

// ── End to end over UDP ──────────────────────────────────────────

#[tokio::test]
async fn test_udp_end_to_end_through_queues() {
    let sink = MemoryQueue::new();
    let receiver = Receiver::bind("127.0.0.1:0", sink.clone(), ReceiverConfig::default())
        .await
        .unwrap();
    let receiver_addr = receiver.local_addr().unwrap();

    let recv_task = tokio::spawn(async move {
        let mut receiver = receiver;
        let _ = receiver.run().await;
    });

    // Source queue holds a zero-length item (skipped) and two messages.
    let mut source = MemoryQueue::new();
    source.push("diode_out", b"").await.unwrap();
    source.push("diode_out", b"hello world").await.unwrap();
    let big = patterned(5000);
    source.push("diode_out", &big).await.unwrap();

    let config = SenderConfig {
        pacing: Duration::from_micros(100),
        ..SenderConfig::default()
    };
    let sender = Sender::bind("127.0.0.1:0", receiver_addr, source, config)
        .await
        .unwrap();
    let send_task = tokio::spawn(async move {
        let mut sender = sender;
        let _ = sender.run().await;
    });

    // Wait for both messages to land in the sink queue.
    let mut sink_reader = sink.clone();
    let deliveries = tokio::time::timeout(Duration::from_secs(15), async move {
        let mut items = Vec::new();
        while items.len() < 2 {
            match sink_reader.pop("diode_in").await.unwrap() {
                Some(item) => items.push(item),
                None => tokio::time::sleep(Duration::from_millis(20)).await,
            }
        }
        items
    })
    .await
    .expect("timed out waiting for deliveries");

    assert_eq!(deliveries[0], b"hello world");
    assert_eq!(deliveries[1], big);

    send_task.abort();
    recv_task.abort();
}
