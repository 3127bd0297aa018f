//! In-memory queue driver for tests and local runs.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use crate::error::QueueError;
use crate::queue::MessageQueue;

/// Process-local FIFO map. Clones share the same storage, so a test can
/// hold one handle while a pipeline owns another.
#[derive(Clone, Default)]
pub struct MemoryQueue {
    inner: Arc<Mutex<HashMap<String, VecDeque<Vec<u8>>>>>,
}

impl MemoryQueue {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl MessageQueue for MemoryQueue {
    async fn push(&mut self, queue: &str, item: &[u8]) -> Result<(), QueueError> {
        let mut inner = self.inner.lock().expect("queue lock");
        inner
            .entry(queue.to_string())
            .or_default()
            .push_back(item.to_vec());
        Ok(())
    }

    async fn pop(&mut self, queue: &str) -> Result<Option<Vec<u8>>, QueueError> {
        let mut inner = self.inner.lock().expect("queue lock");
        Ok(inner.get_mut(queue).and_then(VecDeque::pop_front))
    }

    async fn len(&mut self, queue: &str) -> Result<u64, QueueError> {
        let inner = self.inner.lock().expect("queue lock");
        Ok(inner.get(queue).map_or(0, |q| q.len() as u64))
    }
}
