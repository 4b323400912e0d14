// src/cache.rs

// Bounded code -> URL lookup accelerator in front of the link store.
// Strict LRU: both hits and writes refresh recency; entries never expire on their own.
use parking_lot::Mutex;
use std::collections::{BTreeMap, HashMap};

use crate::config::CacheConfig;

#[derive(Debug)]
struct CacheEntry {
    long_url: String,
    last_touch: u64,
}

#[derive(Debug, Default)]
struct LruState {
    entries: HashMap<String, CacheEntry>,
    /// last_touch -> code; the first key is the least recently used entry
    recency: BTreeMap<u64, String>,
    /// Monotonic touch counter, so no two entries ever share a last_touch
    tick: u64,
}

impl LruState {
    fn next_tick(&mut self) -> u64 {
        self.tick += 1;
        self.tick
    }
}

/// Fixed-capacity least-recently-used cache.
#[derive(Debug)]
pub struct RecencyCache {
    capacity: usize,
    state: Mutex<LruState>,
}

impl RecencyCache {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            state: Mutex::new(LruState {
                entries: HashMap::with_capacity(capacity.min(10_000)),
                ..LruState::default()
            }),
        }
    }

    pub fn from_config(config: &CacheConfig) -> Self {
        Self::new(config.capacity)
    }

    /// Returns the cached URL and marks the entry most recently used
    pub fn get(&self, code: &str) -> Option<String> {
        let mut state = self.state.lock();
        let tick = state.next_tick();
        let LruState {
            entries, recency, ..
        } = &mut *state;

        let entry = entries.get_mut(code)?;
        recency.remove(&entry.last_touch);
        entry.last_touch = tick;
        recency.insert(tick, code.to_string());

        Some(entry.long_url.clone())
    }

    /// Inserts or refreshes a mapping, evicting the least recently used entry when full
    pub fn put(&self, code: &str, long_url: &str) {
        if self.capacity == 0 {
            return;
        }

        let mut state = self.state.lock();
        let tick = state.next_tick();
        let LruState {
            entries, recency, ..
        } = &mut *state;

        if let Some(entry) = entries.get_mut(code) {
            recency.remove(&entry.last_touch);
            entry.long_url = long_url.to_string();
            entry.last_touch = tick;
            recency.insert(tick, code.to_string());
            return;
        }

        if entries.len() >= self.capacity {
            if let Some((_, evicted)) = recency.pop_first() {
                entries.remove(&evicted);
                tracing::debug!(code = %evicted, "Evicted least-recently-used cache entry");
            }
        }

        entries.insert(
            code.to_string(),
            CacheEntry {
                long_url: long_url.to_string(),
                last_touch: tick,
            },
        );
        recency.insert(tick, code.to_string());
    }

    pub fn remove(&self, code: &str) {
        let mut state = self.state.lock();
        if let Some(entry) = state.entries.remove(code) {
            state.recency.remove(&entry.last_touch);
        }
    }

    pub fn clear(&self) {
        let mut state = self.state.lock();
        state.entries.clear();
        state.recency.clear();
    }

    /// Membership test that does not touch recency
    pub fn contains(&self, code: &str) -> bool {
        self.state.lock().entries.contains_key(code)
    }

    pub fn len(&self) -> usize {
        self.state.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

impl Default for RecencyCache {
    fn default() -> Self {
        Self::from_config(&CacheConfig::default())
    }
}
