//! Recently-delivered message ledger.
//!
//! Maps a message tag to the instant it was pushed to the sink queue.
//! While a tag is present, redundant copies of the same message cannot
//! produce a second push. Entries age out so the table stays bounded;
//! the TTL must cover the wall-clock span over which all redundant
//! copies of a message can arrive.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use crate::tag::MsgTag;

/// Entry count above which housekeeping runs.
pub const DEDUP_SOFT_LIMIT: usize = 1000;

/// Age after which a delivery record is forgotten.
pub const DEDUP_TTL: Duration = Duration::from_secs(3600);

pub struct DedupTable {
    entries: HashMap<MsgTag, Instant>,
    soft_limit: usize,
    ttl: Duration,
}

impl DedupTable {
    pub fn new(soft_limit: usize, ttl: Duration) -> Self {
        Self {
            entries: HashMap::new(),
            soft_limit,
            ttl,
        }
    }

    pub fn contains(&self, tag: &MsgTag) -> bool {
        self.entries.contains_key(tag)
    }

    /// Record a delivery. An existing entry keeps its original
    /// timestamp.
    pub fn record(&mut self, tag: MsgTag, now: Instant) {
        self.entries.entry(tag).or_insert(now);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn over_limit(&self) -> bool {
        self.entries.len() > self.soft_limit
    }

    /// Forget entries older than the TTL. Returns how many were dropped.
    pub fn purge_expired(&mut self, now: Instant) -> usize {
        let before = self.entries.len();
        let ttl = self.ttl;
        self.entries
            .retain(|_, recorded| now.duration_since(*recorded) <= ttl);
        before - self.entries.len()
    }

    /// Evict oldest entries until the table is back at its soft limit.
    /// Returns how many were evicted.
    pub fn evict_over_limit(&mut self) -> usize {
        let mut evicted = 0;
        while self.entries.len() > self.soft_limit {
            let oldest = self
                .entries
                .iter()
                .min_by_key(|(_, recorded)| **recorded)
                .map(|(tag, _)| *tag);
            match oldest {
                Some(tag) => {
                    self.entries.remove(&tag);
                    evicted += 1;
                }
                None => break,
            }
        }
        evicted
    }
}
