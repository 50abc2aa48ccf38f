use log::debug;
use std::time::Instant;

use super::{BlobCache, CacheInsert, CacheStats};
use crate::error::FetchError;
use crate::fetch::{format_hint, SampleFetcher};
use crate::models::{SampleBlob, SampleKey};

/// Result of a [`SampleLoader::load`]
#[derive(Debug, Clone)]
pub struct LoadedSample {
    pub blob: SampleBlob,
    /// Served from the cache without calling the fetcher
    pub cache_hit: bool,
    /// Keys evicted to make room for this blob
    pub evicted: Vec<SampleKey>,
    pub fetch_time: std::time::Duration,
}

/// Routes every fetch through a [`BlobCache`].
///
/// A hit promotes the entry and skips the fetcher; a miss fetches the bytes
/// and stores them before returning.
pub struct SampleLoader<F: SampleFetcher> {
    fetcher: F,
    cache: BlobCache,
}

impl<F: SampleFetcher> SampleLoader<F> {
    pub fn new(fetcher: F, cache_max_bytes: usize) -> Self {
        Self {
            fetcher,
            cache: BlobCache::new(cache_max_bytes),
        }
    }

    pub async fn load(&mut self, key: &SampleKey) -> Result<LoadedSample, FetchError> {
        let format = format_hint(key);

        if let Some(bytes) = self.cache.get(key) {
            debug!("Sample {} served from cache", key);
            return Ok(LoadedSample {
                blob: SampleBlob { bytes, format },
                cache_hit: true,
                evicted: Vec::new(),
                fetch_time: std::time::Duration::ZERO,
            });
        }

        let started = Instant::now();
        let bytes = self.fetcher.fetch(key).await?;
        let fetch_time = started.elapsed();

        let evicted = match self.cache.set(key.clone(), bytes.clone()) {
            CacheInsert::Stored { evicted } => evicted,
            CacheInsert::Rejected => Vec::new(),
        };

        Ok(LoadedSample {
            blob: SampleBlob { bytes, format },
            cache_hit: false,
            evicted,
            fetch_time,
        })
    }

    pub fn cache(&self) -> &BlobCache {
        &self.cache
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.cache.stats()
    }

    pub fn fetcher(&self) -> &F {
        &self.fetcher
    }
}
