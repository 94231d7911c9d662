//! Result cache with per-entry expiry and a capacity bound.
//!
//! Eviction is by storage age, not access recency: when the cache grows past
//! its capacity, expired entries go first and then the oldest-stored fraction.

use crate::config::DispatcherConfig;
use crate::types::{Record, SearchKey};
use ahash::AHashMap;
use std::time::Duration;
use tokio::time::Instant;

/// A stored result list.
#[derive(Debug, Clone)]
struct CacheEntry {
    records: Vec<Record>,
    stored_at: Instant,
    /// Insertion sequence; breaks ties between entries stored at the same instant.
    seq: u64,
}

/// Key → result store.
///
/// Not internally synchronized; the dispatcher owns it behind its state lock.
#[derive(Debug)]
pub struct ResultCache {
    entries: AHashMap<SearchKey, CacheEntry>,
    ttl: Duration,
    capacity: usize,
    eviction_ratio: f64,
    next_seq: u64,
}

impl ResultCache {
    #[must_use]
    pub fn new(ttl: Duration, capacity: usize, eviction_ratio: f64) -> Self {
        Self {
            entries: AHashMap::with_capacity(capacity + 1),
            ttl,
            capacity: capacity.max(1),
            eviction_ratio: eviction_ratio.clamp(f64::MIN_POSITIVE, 1.0),
            next_seq: 0,
        }
    }

    #[must_use]
    pub fn from_config(config: &DispatcherConfig) -> Self {
        Self::new(config.cache_ttl(), config.cache_capacity, config.eviction_ratio)
    }

    fn is_fresh(&self, entry: &CacheEntry, now: Instant) -> bool {
        now.saturating_duration_since(entry.stored_at) < self.ttl
    }

    /// Returns the stored records if present and unexpired.
    ///
    /// An expired entry is dropped and reported as a miss.
    pub fn get(&mut self, key: &SearchKey) -> Option<Vec<Record>> {
        let now = Instant::now();
        let fresh = self.entries.get(key).map(|e| self.is_fresh(e, now))?;
        if fresh {
            self.entries.get(key).map(|e| e.records.clone())
        } else {
            self.entries.remove(key);
            None
        }
    }

    /// True if `key` has an unexpired entry. Does not mutate.
    #[must_use]
    pub fn contains(&self, key: &SearchKey) -> bool {
        let now = Instant::now();
        self.entries.get(key).is_some_and(|e| self.is_fresh(e, now))
    }

    /// Stores `records` under `key`, replacing any previous entry.
    pub fn put(&mut self, key: SearchKey, records: Vec<Record>) {
        let seq = self.next_seq;
        self.next_seq += 1;
        self.entries.insert(
            key,
            CacheEntry {
                records,
                stored_at: Instant::now(),
                seq,
            },
        );
        if self.entries.len() > self.capacity {
            self.evict();
        }
    }

    /// Purges expired entries, then drops the oldest-stored share if still over capacity.
    fn evict(&mut self) {
        let now = Instant::now();
        let ttl = self.ttl;
        self.entries
            .retain(|_, e| now.saturating_duration_since(e.stored_at) < ttl);

        let len = self.entries.len();
        if len <= self.capacity {
            return;
        }

        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss, clippy::cast_precision_loss)]
        let count = ((len as f64 * self.eviction_ratio).ceil() as usize).clamp(1, len);

        let mut by_age: Vec<(Instant, u64, SearchKey)> = self
            .entries
            .iter()
            .map(|(k, e)| (e.stored_at, e.seq, k.clone()))
            .collect();
        by_age.sort_unstable_by(|a, b| (a.0, a.1).cmp(&(b.0, b.1)));

        for (_, _, key) in by_age.into_iter().take(count) {
            self.entries.remove(&key);
        }
        tracing::debug!(evicted = count, remaining = self.entries.len(), "cache eviction");
    }

    /// Number of stored entries, including expired ones not yet purged.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of unexpired entries.
    #[must_use]
    pub fn live_len(&self) -> usize {
        let now = Instant::now();
        self.entries.values().filter(|e| self.is_fresh(e, now)).count()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}
