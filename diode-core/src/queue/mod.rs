//! Durable queue drivers at the edges of the diode.
//!
//! Both pipelines treat their queue as an opaque FIFO of byte blobs:
//! push, non-blocking pop, length. The production driver is Redis
//! (RPUSH / LPOP / LLEN); an in-memory driver backs the tests.

use std::time::Duration;

use async_trait::async_trait;
use tracing::warn;

use crate::error::{DiodeError, QueueError};

mod memory;
mod redis;

pub use self::redis::{RedisEndpoint, RedisQueue};
pub use memory::MemoryQueue;

/// Attempts made against an unresponsive queue before giving up.
const RETRY_LIMIT: u32 = 5;

/// Initial delay of the doubling retry backoff.
const RETRY_BASE_DELAY: Duration = Duration::from_millis(200);

/// An opaque FIFO of byte blobs.
#[async_trait]
pub trait MessageQueue: Send {
    /// Append an item to the tail of `queue`.
    async fn push(&mut self, queue: &str, item: &[u8]) -> Result<(), QueueError>;

    /// Remove and return the head of `queue`, or `None` when empty.
    async fn pop(&mut self, queue: &str) -> Result<Option<Vec<u8>>, QueueError>;

    /// Number of items currently in `queue`.
    async fn len(&mut self, queue: &str) -> Result<u64, QueueError>;
}

/// Push with bounded backoff; a persistently unavailable queue is fatal.
pub async fn push_with_retry<Q: MessageQueue>(
    queue: &mut Q,
    name: &str,
    item: &[u8],
) -> Result<(), DiodeError> {
    let mut delay = RETRY_BASE_DELAY;
    let mut attempt = 0u32;
    loop {
        attempt += 1;
        match queue.push(name, item).await {
            Ok(()) => return Ok(()),
            Err(e) if attempt >= RETRY_LIMIT => {
                return Err(DiodeError::Queue(QueueError::Unavailable {
                    attempts: attempt,
                    reason: e.to_string(),
                }));
            }
            Err(e) => {
                warn!(queue = name, attempt, error = %e, "queue push failed; retrying");
                tokio::time::sleep(delay).await;
                delay *= 2;
            }
        }
    }
}

/// Pop with bounded backoff; a persistently unavailable queue is fatal.
pub async fn pop_with_retry<Q: MessageQueue>(
    queue: &mut Q,
    name: &str,
) -> Result<Option<Vec<u8>>, DiodeError> {
    let mut delay = RETRY_BASE_DELAY;
    let mut attempt = 0u32;
    loop {
        attempt += 1;
        match queue.pop(name).await {
            Ok(item) => return Ok(item),
            Err(e) if attempt >= RETRY_LIMIT => {
                return Err(DiodeError::Queue(QueueError::Unavailable {
                    attempts: attempt,
                    reason: e.to_string(),
                }));
            }
            Err(e) => {
                warn!(queue = name, attempt, error = %e, "queue pop failed; retrying");
                tokio::time::sleep(delay).await;
                delay *= 2;
            }
        }
    }
}
