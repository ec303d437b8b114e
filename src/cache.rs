//! Bounded memo cache that grows when its hit rate is poor
//!
//! Keys are tracked in an access history (approximate LRU: a key moves to the
//! back on every hit or insert). When the cache is full, inserting a new key
//! evicts exactly one entry, the oldest tracked key. On a miss the cache
//! checks whether it is under-performing (hit rate below the resize threshold,
//! or a history shorter than half the initial capacity) and, if so, grows its
//! capacity by 50%.

use parking_lot::Mutex;
use serde::Serialize;
use std::collections::{HashMap, VecDeque};
use std::fmt;
use std::hash::Hash;

/// Default hit-rate below which the cache grows
pub const DEFAULT_RESIZE_THRESHOLD: f64 = 0.8;

/// Cache key: either text or an integer
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum CacheKey {
    Text(String),
    Int(u64),
}

impl From<&str> for CacheKey {
    fn from(value: &str) -> Self {
        CacheKey::Text(value.to_string())
    }
}

impl From<String> for CacheKey {
    fn from(value: String) -> Self {
        CacheKey::Text(value)
    }
}

impl From<u64> for CacheKey {
    fn from(value: u64) -> Self {
        CacheKey::Int(value)
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CacheKey::Text(s) => f.write_str(s),
            CacheKey::Int(i) => write!(f, "{i}"),
        }
    }
}

/// Cumulative counters, reported in sort statistics
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub capacity: usize,
    pub len: usize,
}

impl CacheStats {
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

struct CacheState<K, V> {
    entries: HashMap<K, V>,
    history: VecDeque<K>,
    capacity: usize,
    min_capacity: usize,
    hits: u64,
    misses: u64,
}

impl<K: Eq + Hash + Clone, V> CacheState<K, V> {
    fn touch(&mut self, key: &K) {
        if let Some(pos) = self.history.iter().position(|k| k == key) {
            self.history.remove(pos);
        }
        self.history.push_back(key.clone());
    }

    fn should_resize(&self, resize_threshold: f64) -> bool {
        if self.history.is_empty() {
            return false;
        }
        let hit_rate = self.hits as f64 / (self.hits + self.misses + 1) as f64;
        hit_rate < resize_threshold || self.history.len() < self.min_capacity
    }

    fn evict_oldest(&mut self) {
        while let Some(oldest) = self.history.pop_front() {
            if self.entries.remove(&oldest).is_some() {
                return;
            }
        }
    }
}

/// Adaptive key/value cache shared between algorithm paths
pub struct AdaptiveCache<K, V> {
    state: Mutex<CacheState<K, V>>,
    resize_threshold: f64,
}

impl<K: Eq + Hash + Clone, V: Clone> AdaptiveCache<K, V> {
    pub fn new(initial_size: usize) -> Self {
        Self::with_threshold(initial_size, DEFAULT_RESIZE_THRESHOLD)
    }

    pub fn with_threshold(initial_size: usize, resize_threshold: f64) -> Self {
        let capacity = initial_size.max(1);
        Self {
            state: Mutex::new(CacheState {
                entries: HashMap::with_capacity(capacity),
                history: VecDeque::with_capacity(capacity),
                capacity,
                min_capacity: capacity / 2,
                hits: 0,
                misses: 0,
            }),
            resize_threshold,
        }
    }

    /// Look up `key`, counting a hit or a miss
    pub fn get(&self, key: &K) -> Option<V> {
        let mut state = self.state.lock();
        if let Some(value) = state.entries.get(key).cloned() {
            state.hits += 1;
            state.touch(key);
            return Some(value);
        }

        state.misses += 1;
        if state.should_resize(self.resize_threshold) {
            let grown = (state.capacity as f64 * 1.5) as usize;
            state.capacity = grown.max(state.min_capacity).max(state.capacity);
        }
        None
    }

    /// Insert or replace `key`, evicting the oldest tracked key when full
    pub fn put(&self, key: K, value: V) {
        let mut state = self.state.lock();
        if !state.entries.contains_key(&key) && state.entries.len() >= state.capacity {
            state.evict_oldest();
        }
        state.touch(&key);
        state.entries.insert(key, value);
    }

    pub fn capacity(&self) -> usize {
        self.state.lock().capacity
    }

    pub fn len(&self) -> usize {
        self.state.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn stats(&self) -> CacheStats {
        let state = self.state.lock();
        CacheStats {
            hits: state.hits,
            misses: state.misses,
            capacity: state.capacity,
            len: state.entries.len(),
        }
    }
}
