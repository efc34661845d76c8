//! Bounded memo of sanitized select fields.
//!
//! The same field strings recur across many builds, so successful
//! sanitization results are kept keyed by `(field, dialect)`. Rejections are
//! never cached; they are cheap to recompute and must keep failing loudly.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, PoisonError};

use crate::query_ast::Dialect;

pub const DEFAULT_CACHE_SIZE: usize = 1024;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct CacheKey {
    field: String,
    dialect: Dialect,
}

#[derive(Debug, Clone)]
struct CacheEntry {
    sanitized: String,
    /// Logical clock value of the last access, for LRU ordering
    last_accessed: u64,
}

/// Thread-safe LRU cache for sanitized fields
#[derive(Debug)]
pub struct SanitizeCache {
    entries: Mutex<HashMap<CacheKey, CacheEntry>>,
    max_entries: usize,
    clock: AtomicU64,
    hits: AtomicU64,
    misses: AtomicU64,
    evictions: AtomicU64,
}

impl SanitizeCache {
    pub fn new(max_entries: usize) -> Self {
        SanitizeCache {
            entries: Mutex::new(HashMap::new()),
            max_entries: max_entries.max(1),
            clock: AtomicU64::new(0),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            evictions: AtomicU64::new(0),
        }
    }

    fn tick(&self) -> u64 {
        self.clock.fetch_add(1, Ordering::Relaxed)
    }

    pub fn get(&self, field: &str, dialect: Dialect) -> Option<String> {
        let key = CacheKey {
            field: field.to_string(),
            dialect,
        };
        let now = self.tick();
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        match entries.get_mut(&key) {
            Some(entry) => {
                entry.last_accessed = now;
                self.hits.fetch_add(1, Ordering::Relaxed);
                log::trace!("sanitize cache hit: {}", field);
                Some(entry.sanitized.clone())
            }
            None => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                log::trace!("sanitize cache miss: {}", field);
                None
            }
        }
    }

    pub fn insert(&self, field: &str, dialect: Dialect, sanitized: String) {
        let key = CacheKey {
            field: field.to_string(),
            dialect,
        };
        let entry = CacheEntry {
            sanitized,
            last_accessed: self.tick(),
        };
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        if !entries.contains_key(&key) && entries.len() >= self.max_entries {
            self.evict_lru(&mut entries);
        }
        entries.insert(key, entry);
    }

    fn evict_lru(&self, entries: &mut HashMap<CacheKey, CacheEntry>) {
        if let Some(key) = entries
            .iter()
            .min_by_key(|(_, entry)| entry.last_accessed)
            .map(|(key, _)| key.clone())
        {
            entries.remove(&key);
            self.evictions.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn clear(&self) {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }

    pub fn metrics(&self) -> CacheMetrics {
        let size = self
            .entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len();
        CacheMetrics {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            evictions: self.evictions.load(Ordering::Relaxed),
            size,
            max_entries: self.max_entries,
        }
    }
}

impl Default for SanitizeCache {
    fn default() -> Self {
        Self::new(DEFAULT_CACHE_SIZE)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheMetrics {
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
    pub size: usize,
    pub max_entries: usize,
}

impl CacheMetrics {
    /// Cache hit rate (0.0 to 1.0)
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}
