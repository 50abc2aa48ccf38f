//! Byte-budgeted LRU cache of raw sample audio.
//!
//! Entries are kept in an [`LruCache`] whose internal list is the recency
//! order, so eviction always removes the least recently set or read entry.
//! The cache does not decode anything; it only stores the fetched bytes.

mod loader;

pub use loader::SampleLoader;

use bytes::Bytes;
use log::{debug, trace};
use lru::LruCache;
use serde::{Deserialize, Serialize};

use crate::models::SampleKey;

/// Statistics reported to telemetry and diagnostics views
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheStats {
    pub count: usize,
    pub size: usize,
    pub max_size: usize,
}

impl CacheStats {
    /// Cache usage as a percentage of max size
    pub fn usage_percentage(&self) -> f64 {
        if self.max_size == 0 {
            return 0.0;
        }

        (self.size as f64 / self.max_size as f64) * 100.0
    }

    /// Returns true if the cache is near capacity (>90%)
    pub fn is_near_capacity(&self) -> bool {
        self.usage_percentage() > 90.0
    }

    /// Format statistics as a human-readable line
    pub fn format_stats(&self) -> String {
        format!(
            "{} samples, {:.2} MB / {:.2} MB ({:.1}%)",
            self.count,
            self.size as f64 / 1024.0 / 1024.0,
            self.max_size as f64 / 1024.0 / 1024.0,
            self.usage_percentage()
        )
    }
}

/// Outcome of a [`BlobCache::set`] call
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CacheInsert {
    /// Stored; lists the keys evicted to make room
    Stored { evicted: Vec<SampleKey> },
    /// Blob alone is larger than the whole budget and was not stored
    Rejected,
}

/// Capacity-bounded least-recently-used store of sample bytes
pub struct BlobCache {
    entries: LruCache<SampleKey, Bytes>,
    total_size: usize,
    max_size: usize,
}

impl BlobCache {
    /// Create an empty cache holding at most `max_size` bytes
    pub fn new(max_size: usize) -> Self {
        Self {
            entries: LruCache::unbounded(),
            total_size: 0,
            max_size,
        }
    }

    /// Insert or overwrite `key`, then evict until the byte budget holds
    pub fn set(&mut self, key: impl Into<SampleKey>, blob: Bytes) -> CacheInsert {
        let key = key.into();
        let size = blob.len();

        if size > self.max_size {
            debug!(
                "Not caching sample {} ({} bytes exceeds cache budget of {} bytes)",
                key, size, self.max_size
            );
            return CacheInsert::Rejected;
        }

        // `push` hands back the displaced value on overwrite
        if let Some((_, old)) = self.entries.push(key.clone(), blob) {
            self.total_size -= old.len();
        }
        self.total_size += size;

        let evicted = self.evict_to_budget();
        trace!(
            "Cached sample {} ({} bytes, total {} / {} bytes)",
            key, size, self.total_size, self.max_size
        );

        CacheInsert::Stored { evicted }
    }

    /// Look up `key`, marking it most recently used on a hit
    pub fn get(&mut self, key: &SampleKey) -> Option<Bytes> {
        self.entries.get(key).cloned()
    }

    /// Existence check that leaves the recency order untouched
    pub fn has(&self, key: &SampleKey) -> bool {
        self.entries.contains(key)
    }

    /// Drop a single entry
    pub fn remove(&mut self, key: &SampleKey) -> Option<Bytes> {
        let removed = self.entries.pop(key)?;
        self.total_size -= removed.len();
        Some(removed)
    }

    /// Remove every entry
    pub fn clear(&mut self) {
        self.entries.clear();
        self.total_size = 0;
        debug!("Cleared sample cache");
    }

    /// Change the byte budget, evicting immediately when it shrinks
    pub fn set_max_size(&mut self, max_size: usize) -> Vec<SampleKey> {
        self.max_size = max_size;
        self.evict_to_budget()
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            count: self.entries.len(),
            size: self.total_size,
            max_size: self.max_size,
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn evict_to_budget(&mut self) -> Vec<SampleKey> {
        let mut evicted = Vec::new();

        while self.total_size > self.max_size {
            match self.entries.pop_lru() {
                Some((key, blob)) => {
                    self.total_size -= blob.len();
                    debug!("Evicted sample {} from cache ({} bytes)", key, blob.len());
                    evicted.push(key);
                }
                None => break,
            }
        }

        evicted
    }
}
