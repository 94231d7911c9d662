//! FIFO queue plus concurrency limiter.
//!
//! Holds the per-key state machine
//! `Queued -> Active -> {Succeeded | Retrying -> Queued | Exhausted}`
//! without doing any I/O. The dispatcher drives it: it calls [`Scheduler::admit`]
//! to start work and reports completions back with the admission's generation,
//! which makes duplicate or stale completions harmless.

use crate::types::{Category, SearchKey};
use ahash::{AHashMap, AHashSet};
use std::collections::VecDeque;

/// A search waiting for (or between) executions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueEntry {
    pub key: SearchKey,
    /// Query as typed (trimmed), sent to the backend
    pub query: String,
    pub category: Category,
    /// Failed attempts so far
    pub attempt: u32,
}

impl QueueEntry {
    #[must_use]
    pub fn new(text: &str, category: Category) -> Self {
        Self {
            key: SearchKey::new(category, text),
            query: text.trim().to_string(),
            category,
            attempt: 0,
        }
    }
}

/// An entry moved to Active, tagged with its generation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Admission {
    pub entry: QueueEntry,
    pub generation: u64,
}

/// Where a key currently sits in the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyState {
    Queued,
    Active,
    Retrying,
}

/// Result of [`Scheduler::enqueue`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Enqueued {
    Queued,
    /// The key already has a pipeline; nothing was added.
    Duplicate(KeyState),
}

/// Queue and active-set bookkeeping.
#[derive(Debug)]
pub struct Scheduler {
    limit: usize,
    queue: VecDeque<QueueEntry>,
    queued: AHashSet<SearchKey>,
    active: AHashMap<SearchKey, u64>,
    retrying: AHashSet<SearchKey>,
    next_generation: u64,
    completed: u64,
    exhausted: u64,
}

impl Scheduler {
    #[must_use]
    pub fn new(limit: usize) -> Self {
        Self {
            limit: limit.max(1),
            queue: VecDeque::new(),
            queued: AHashSet::new(),
            active: AHashMap::new(),
            retrying: AHashSet::new(),
            next_generation: 0,
            completed: 0,
            exhausted: 0,
        }
    }

    #[must_use]
    pub fn state(&self, key: &SearchKey) -> Option<KeyState> {
        if self.active.contains_key(key) {
            Some(KeyState::Active)
        } else if self.queued.contains(key) {
            Some(KeyState::Queued)
        } else if self.retrying.contains(key) {
            Some(KeyState::Retrying)
        } else {
            None
        }
    }

    /// Adds `entry` to the back of the queue unless its key already has a pipeline.
    pub fn enqueue(&mut self, entry: QueueEntry) -> Enqueued {
        if let Some(state) = self.state(&entry.key) {
            return Enqueued::Duplicate(state);
        }
        self.queued.insert(entry.key.clone());
        self.queue.push_back(entry);
        Enqueued::Queued
    }

    /// Pops the front entry into Active if a slot is free.
    pub fn admit(&mut self) -> Option<Admission> {
        if self.active.len() >= self.limit {
            return None;
        }
        let entry = self.queue.pop_front()?;
        self.queued.remove(&entry.key);
        let generation = self.next_generation;
        self.next_generation += 1;
        self.active.insert(entry.key.clone(), generation);
        Some(Admission { entry, generation })
    }

    /// Pops as many entries as there are free slots.
    pub fn admit_all(&mut self) -> Vec<Admission> {
        std::iter::from_fn(|| self.admit()).collect()
    }

    /// True if `generation` is the live admission for `key`.
    #[must_use]
    pub fn is_current(&self, key: &SearchKey, generation: u64) -> bool {
        self.active.get(key) == Some(&generation)
    }

    fn release(&mut self, key: &SearchKey, generation: u64) -> bool {
        if self.is_current(key, generation) {
            self.active.remove(key);
            true
        } else {
            false
        }
    }

    /// Active → Succeeded. Returns false for stale completions.
    pub fn succeed(&mut self, key: &SearchKey, generation: u64) -> bool {
        let released = self.release(key, generation);
        if released {
            self.completed += 1;
        }
        released
    }

    /// Active → Exhausted. Returns false for stale completions.
    pub fn exhaust(&mut self, key: &SearchKey, generation: u64) -> bool {
        let released = self.release(key, generation);
        if released {
            self.exhausted += 1;
        }
        released
    }

    /// Active → dropped (aborted). Returns false for stale completions.
    pub fn abort(&mut self, key: &SearchKey, generation: u64) -> bool {
        self.release(key, generation)
    }

    /// Active → Retrying. The entry re-enters via [`Scheduler::requeue`].
    pub fn park_for_retry(&mut self, key: &SearchKey, generation: u64) -> bool {
        let released = self.release(key, generation);
        if released {
            self.retrying.insert(key.clone());
        }
        released
    }

    /// Retrying → Queued. Returns false if the key was cancelled meanwhile.
    pub fn requeue(&mut self, entry: QueueEntry) -> bool {
        if !self.retrying.remove(&entry.key) {
            return false;
        }
        self.queued.insert(entry.key.clone());
        self.queue.push_back(entry);
        true
    }

    /// Removes `key` from whichever state it is in.
    pub fn remove(&mut self, key: &SearchKey) -> Option<KeyState> {
        let state = self.state(key)?;
        match state {
            KeyState::Active => {
                self.active.remove(key);
            }
            KeyState::Queued => {
                self.queued.remove(key);
                self.queue.retain(|e| &e.key != key);
            }
            KeyState::Retrying => {
                self.retrying.remove(key);
            }
        }
        Some(state)
    }

    /// Removes every key of `category`; returns the removed keys.
    pub fn remove_category(&mut self, category: Category) -> Vec<SearchKey> {
        let keys: Vec<SearchKey> = self
            .active
            .keys()
            .chain(self.queued.iter())
            .chain(self.retrying.iter())
            .filter(|k| k.category == category)
            .cloned()
            .collect();
        for key in &keys {
            self.remove(key);
        }
        keys
    }

    /// Drops all queued, active and retrying work. Counters are kept.
    pub fn clear(&mut self) {
        self.queue.clear();
        self.queued.clear();
        self.active.clear();
        self.retrying.clear();
    }

    #[must_use]
    pub fn queued_len(&self) -> usize {
        self.queue.len()
    }

    #[must_use]
    pub fn active_len(&self) -> usize {
        self.active.len()
    }

    #[must_use]
    pub fn retrying_len(&self) -> usize {
        self.retrying.len()
    }

    #[must_use]
    pub fn completed(&self) -> u64 {
        self.completed
    }

    #[must_use]
    pub fn exhausted(&self) -> u64 {
        self.exhausted
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(q: &str) -> QueueEntry {
        QueueEntry::new(q, Category::Courses)
    }

    #[test]
    fn test_dedup_while_queued_or_active() {
        let mut s = Scheduler::new(1);
        assert_eq!(s.enqueue(entry("rust")), Enqueued::Queued);
        assert_eq!(
            s.enqueue(entry("RUST ")),
            Enqueued::Duplicate(KeyState::Queued)
        );

        let adm = s.admit().unwrap();
        assert_eq!(
            s.enqueue(entry("rust")),
            Enqueued::Duplicate(KeyState::Active)
        );

        assert!(s.succeed(&adm.entry.key, adm.generation));
        assert_eq!(s.enqueue(entry("rust")), Enqueued::Queued);
    }

    #[test]
    fn test_limit_three_with_five_keys() {
        let mut s = Scheduler::new(3);
        for q in ["a1", "b2", "c3", "d4", "e5"] {
            s.enqueue(entry(q));
        }

        let first = s.admit_all();
        assert_eq!(first.len(), 3);
        assert_eq!(s.active_len(), 3);
        assert_eq!(s.queued_len(), 2);
        assert!(s.admit().is_none());

        // One slot frees → exactly one more admitted, in FIFO order
        assert!(s.succeed(&first[0].entry.key, first[0].generation));
        let next = s.admit_all();
        assert_eq!(next.len(), 1);
        assert_eq!(next[0].entry.query, "d4");
        assert_eq!(s.active_len(), 3);
        assert_eq!(s.queued_len(), 1);
    }

    #[test]
    fn test_active_never_exceeds_limit() {
        let mut s = Scheduler::new(2);
        let mut live = Vec::new();
        for i in 0..20 {
            s.enqueue(entry(&format!("q{i}")));
            live.extend(s.admit_all());
            assert!(s.active_len() <= 2);
            if i % 3 == 0 {
                if let Some(adm) = live.pop() {
                    s.succeed(&adm.entry.key, adm.generation);
                }
            }
        }
    }

    #[test]
    fn test_stale_generation_ignored() {
        let mut s = Scheduler::new(3);
        s.enqueue(entry("rust"));
        let adm = s.admit().unwrap();
        assert!(s.succeed(&adm.entry.key, adm.generation));
        // Second completion for the same admission is a no-op
        assert!(!s.succeed(&adm.entry.key, adm.generation));
        assert_eq!(s.completed(), 1);

        // A new admission of the same key has a new generation
        s.enqueue(entry("rust"));
        let again = s.admit().unwrap();
        assert_ne!(again.generation, adm.generation);
        assert!(!s.abort(&adm.entry.key, adm.generation));
        assert!(s.is_current(&again.entry.key, again.generation));
    }

    #[test]
    fn test_retry_cycle() {
        let mut s = Scheduler::new(1);
        s.enqueue(entry("rust"));
        let adm = s.admit().unwrap();
        assert!(s.park_for_retry(&adm.entry.key, adm.generation));
        assert_eq!(s.state(&adm.entry.key), Some(KeyState::Retrying));
        assert_eq!(s.active_len(), 0);
        assert_eq!(
            s.enqueue(entry("rust")),
            Enqueued::Duplicate(KeyState::Retrying)
        );

        let mut retry = adm.entry.clone();
        retry.attempt = 1;
        assert!(s.requeue(retry));
        let adm2 = s.admit().unwrap();
        assert_eq!(adm2.entry.attempt, 1);
    }

    #[test]
    fn test_requeue_after_remove_is_refused() {
        let mut s = Scheduler::new(1);
        s.enqueue(entry("rust"));
        let adm = s.admit().unwrap();
        s.park_for_retry(&adm.entry.key, adm.generation);
        assert_eq!(s.remove(&adm.entry.key), Some(KeyState::Retrying));
        assert!(!s.requeue(adm.entry));
        assert_eq!(s.queued_len(), 0);
    }

    #[test]
    fn test_remove_category() {
        let mut s = Scheduler::new(1);
        s.enqueue(QueueEntry::new("rust", Category::Posts));
        s.enqueue(QueueEntry::new("go", Category::Posts));
        s.enqueue(QueueEntry::new("rust", Category::Lessons));
        s.admit();

        let removed = s.remove_category(Category::Posts);
        assert_eq!(removed.len(), 2);
        assert_eq!(s.active_len(), 0);
        assert_eq!(s.queued_len(), 1);
        assert_eq!(
            s.admit().unwrap().entry.key,
            SearchKey::new(Category::Lessons, "rust")
        );
    }

    #[test]
    fn test_clear_keeps_counters() {
        let mut s = Scheduler::new(2);
        s.enqueue(entry("a1"));
        let adm = s.admit().unwrap();
        s.exhaust(&adm.entry.key, adm.generation);
        s.enqueue(entry("b2"));
        s.admit();
        s.enqueue(entry("c3"));
        s.clear();
        assert_eq!(s.active_len() + s.queued_len() + s.retrying_len(), 0);
        assert_eq!(s.exhausted(), 1);
    }
}
