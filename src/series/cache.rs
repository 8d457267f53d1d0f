//! Process-wide cache of compounded series with time-boxed refresh
//!
//! Single writer per key, many readers:
//! - Fresh entry: returned directly
//! - Expired or missing: exactly one caller refreshes; others either wait for
//!   that refresh or, if an older value exists, receive it immediately
//! - Values are swapped in whole, never partially written
//! - A failed refresh keeps the older value and serves it; with no older value
//!   the error goes to the caller

use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, RwLock};
use std::time::{Duration, Instant};

use log::{debug, info, warn};

use super::types::CompoundedSeries;
use crate::error::Result;

/// Default time-to-live for cached series (24 hours)
pub const DEFAULT_TTL: Duration = Duration::from_secs(24 * 60 * 60);

/// A cached series and when it was refreshed
#[derive(Debug, Clone)]
pub struct CachedSeries {
    pub series: Arc<CompoundedSeries>,
    refreshed_at: Instant,
}

impl CachedSeries {
    fn new(series: CompoundedSeries) -> Self {
        Self {
            series: Arc::new(series),
            refreshed_at: Instant::now(),
        }
    }

    pub fn age(&self) -> Duration {
        self.refreshed_at.elapsed()
    }

    pub fn is_fresh(&self, ttl: Duration) -> bool {
        self.age() < ttl
    }
}

/// Snapshot of cache counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub refreshes: u64,
    pub stale_served: u64,
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

/// Keyed cache of compounded series
#[derive(Debug)]
pub struct SeriesCache {
    ttl: Duration,
    entries: RwLock<HashMap<String, CachedSeries>>,
    refresh_locks: Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>,
    hits: AtomicU64,
    misses: AtomicU64,
    refreshes: AtomicU64,
    stale_served: AtomicU64,
}

impl SeriesCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: RwLock::new(HashMap::new()),
            refresh_locks: Mutex::new(HashMap::new()),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            refreshes: AtomicU64::new(0),
            stale_served: AtomicU64::new(0),
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Current entry for a key, fresh or not
    pub fn get(&self, key: &str) -> Option<CachedSeries> {
        self.entries
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(key)
            .cloned()
    }

    fn fresh(&self, key: &str) -> Option<Arc<CompoundedSeries>> {
        self.get(key)
            .filter(|entry| entry.is_fresh(self.ttl))
            .map(|entry| entry.series)
    }

    fn refresh_lock(&self, key: &str) -> Arc<tokio::sync::Mutex<()>> {
        self.refresh_locks
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .entry(key.to_string())
            .or_default()
            .clone()
    }

    /// Store a series, replacing any previous value
    pub fn insert(&self, key: &str, series: CompoundedSeries) -> Arc<CompoundedSeries> {
        let entry = CachedSeries::new(series);
        let shared = entry.series.clone();
        self.entries
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .insert(key.to_string(), entry);
        shared
    }

    /// Return the cached series, running `refresh` when it is missing or expired
    pub async fn get_or_refresh<F, Fut>(
        &self,
        key: &str,
        refresh: F,
    ) -> Result<Arc<CompoundedSeries>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<CompoundedSeries>>,
    {
        if let Some(series) = self.fresh(key) {
            self.hits.fetch_add(1, Ordering::Relaxed);
            return Ok(series);
        }

        let lock = self.refresh_lock(key);
        let _guard = match lock.try_lock() {
            Ok(guard) => guard,
            Err(_) => {
                // Refresh in flight: serve the previous value if there is one
                if let Some(previous) = self.get(key) {
                    self.stale_served.fetch_add(1, Ordering::Relaxed);
                    debug!("Serving previous value for '{}' during refresh", key);
                    return Ok(previous.series);
                }
                lock.lock().await
            }
        };

        // Another caller may have finished the refresh while we waited
        if let Some(series) = self.fresh(key) {
            self.hits.fetch_add(1, Ordering::Relaxed);
            return Ok(series);
        }

        self.misses.fetch_add(1, Ordering::Relaxed);
        self.refreshes.fetch_add(1, Ordering::Relaxed);
        match refresh().await {
            Ok(series) => {
                info!("Refreshed cached series '{}'", key);
                Ok(self.insert(key, series))
            }
            Err(e) => match self.get(key) {
                Some(previous) => {
                    self.stale_served.fetch_add(1, Ordering::Relaxed);
                    warn!("Refresh of '{}' failed, serving previous value: {}", key, e);
                    Ok(previous.series)
                }
                None => Err(e),
            },
        }
    }

    /// Drop one key so the next read refreshes it
    pub fn invalidate(&self, key: &str) -> Option<CachedSeries> {
        let mut locks = self.refresh_locks.lock().unwrap_or_else(|e| e.into_inner());
        // A lock still referenced elsewhere belongs to a refresh in flight
        if locks.get(key).is_some_and(|lock| Arc::strong_count(lock) == 1) {
            locks.remove(key);
        }
        drop(locks);

        self.entries
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .remove(key)
    }

    /// Clear all cached data and counters
    pub fn clear(&self) {
        self.refresh_locks
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .retain(|_, lock| Arc::strong_count(lock) > 1);
        self.entries.write().unwrap_or_else(|e| e.into_inner()).clear();
        self.hits.store(0, Ordering::Relaxed);
        self.misses.store(0, Ordering::Relaxed);
        self.refreshes.store(0, Ordering::Relaxed);
        self.stale_served.store(0, Ordering::Relaxed);
    }

    pub fn len(&self) -> usize {
        self.entries.read().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            refreshes: self.refreshes.load(Ordering::Relaxed),
            stale_served: self.stale_served.load(Ordering::Relaxed),
        }
    }
}

impl Default for SeriesCache {
    fn default() -> Self {
        Self::new(DEFAULT_TTL)
    }
}
