//! Pool metrics for monitoring and debugging.
//!
//! Thread-safe counters so read-side sampling never blocks the mutator.

use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};

/// Counters for block pool operations.
pub struct PoolMetrics {
    /// Total allocation calls
    allocations: AtomicU64,
    /// Total blocks handed out
    blocks_allocated: AtomicU64,
    /// Total blocks returned to the free list
    blocks_freed: AtomicU64,
    /// Total blocks published in the prefix index
    blocks_cached: AtomicU64,
    /// Total cache entries invalidated (block repurposed or reset)
    blocks_evicted: AtomicU64,
    /// Total prefix chain walks
    cache_queries: AtomicU64,
    /// Blocks reused from the prefix index
    cache_hits: AtomicU64,
    /// Blocks that had to be newly allocated
    cache_misses: AtomicU64,
}

impl Default for PoolMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl PoolMetrics {
    pub fn new() -> Self {
        Self {
            allocations: AtomicU64::new(0),
            blocks_allocated: AtomicU64::new(0),
            blocks_freed: AtomicU64::new(0),
            blocks_cached: AtomicU64::new(0),
            blocks_evicted: AtomicU64::new(0),
            cache_queries: AtomicU64::new(0),
            cache_hits: AtomicU64::new(0),
            cache_misses: AtomicU64::new(0),
        }
    }

    pub fn record_allocation(&self, num_blocks: usize) {
        self.allocations.fetch_add(1, Ordering::Relaxed);
        self.blocks_allocated
            .fetch_add(num_blocks as u64, Ordering::Relaxed);
    }

    pub fn record_free(&self, num_blocks: usize) {
        self.blocks_freed
            .fetch_add(num_blocks as u64, Ordering::Relaxed);
    }

    pub fn record_cached(&self, num_blocks: usize) {
        self.blocks_cached
            .fetch_add(num_blocks as u64, Ordering::Relaxed);
    }

    pub fn record_eviction(&self, num_blocks: usize) {
        self.blocks_evicted
            .fetch_add(num_blocks as u64, Ordering::Relaxed);
    }

    pub fn record_cache_query(&self, hits: usize, misses: usize) {
        self.cache_queries.fetch_add(1, Ordering::Relaxed);
        self.cache_hits.fetch_add(hits as u64, Ordering::Relaxed);
        self.cache_misses
            .fetch_add(misses as u64, Ordering::Relaxed);
    }

    pub fn allocations(&self) -> u64 {
        self.allocations.load(Ordering::Relaxed)
    }

    pub fn blocks_allocated(&self) -> u64 {
        self.blocks_allocated.load(Ordering::Relaxed)
    }

    pub fn blocks_freed(&self) -> u64 {
        self.blocks_freed.load(Ordering::Relaxed)
    }

    pub fn blocks_cached(&self) -> u64 {
        self.blocks_cached.load(Ordering::Relaxed)
    }

    pub fn blocks_evicted(&self) -> u64 {
        self.blocks_evicted.load(Ordering::Relaxed)
    }

    pub fn cache_queries(&self) -> u64 {
        self.cache_queries.load(Ordering::Relaxed)
    }

    pub fn cache_hits(&self) -> u64 {
        self.cache_hits.load(Ordering::Relaxed)
    }

    pub fn cache_misses(&self) -> u64 {
        self.cache_misses.load(Ordering::Relaxed)
    }

    /// Prefix cache hit rate over all queries, `None` before the first one.
    pub fn hit_rate(&self) -> Option<f64> {
        let hits = self.cache_hits.load(Ordering::Relaxed);
        let misses = self.cache_misses.load(Ordering::Relaxed);
        let total = hits + misses;
        if total == 0 {
            None
        } else {
            Some(hits as f64 / total as f64)
        }
    }

    pub fn reset(&self) {
        self.allocations.store(0, Ordering::Relaxed);
        self.blocks_allocated.store(0, Ordering::Relaxed);
        self.blocks_freed.store(0, Ordering::Relaxed);
        self.blocks_cached.store(0, Ordering::Relaxed);
        self.blocks_evicted.store(0, Ordering::Relaxed);
        self.cache_queries.store(0, Ordering::Relaxed);
        self.cache_hits.store(0, Ordering::Relaxed);
        self.cache_misses.store(0, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            allocations: self.allocations(),
            blocks_allocated: self.blocks_allocated(),
            blocks_freed: self.blocks_freed(),
            blocks_cached: self.blocks_cached(),
            blocks_evicted: self.blocks_evicted(),
            cache_queries: self.cache_queries(),
            cache_hits: self.cache_hits(),
            cache_misses: self.cache_misses(),
            hit_rate: self.hit_rate(),
        }
    }
}

/// Point-in-time copy of all counters.
#[derive(Debug, Clone, Default, Serialize)]
pub struct MetricsSnapshot {
    pub allocations: u64,
    pub blocks_allocated: u64,
    pub blocks_freed: u64,
    pub blocks_cached: u64,
    pub blocks_evicted: u64,
    pub cache_queries: u64,
    pub cache_hits: u64,
    pub cache_misses: u64,
    pub hit_rate: Option<f64>,
}
