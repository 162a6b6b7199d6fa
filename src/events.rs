//! Block lifecycle notifications and a sampling tracker built on them.
//!
//! The pool fires one callback per state transition: allocated, freed,
//! cached, evicted. Callbacks are synchronous and must return promptly;
//! the pool never waits, so sampling and throttling are the observer's
//! responsibility.

use std::collections::HashMap;
use std::time::Instant;

use crate::block_table::{BlockId, BlockState};

/// Receiver for block state transitions.
///
/// Default methods are no-ops so implementors pick the transitions they
/// care about.
pub trait BlockObserver {
    /// Block handed out: freshly popped, or revived from free-but-cached
    /// by a cache hit. Not fired when a hit only bumps the ref count of an
    /// already-allocated block.
    fn on_block_allocated(&mut self, _block_id: BlockId, _state: BlockState) {}

    /// Reference count reached zero; block appended to the free list.
    fn on_block_freed(&mut self, _block_id: BlockId, _state: BlockState) {}

    /// Block content completed and published in the prefix index.
    fn on_block_cached(&mut self, _block_id: BlockId, _state: BlockState) {}

    /// Cache entry invalidated: the block's slot was repurposed for new
    /// content, or the index was reset.
    fn on_block_evicted(&mut self, _block_id: BlockId, _state: BlockState) {}
}

/// Summary emitted when a tracked block's cache entry is evicted.
#[derive(Debug, Clone)]
pub struct BlockEvictionReport {
    pub block_id: BlockId,
    /// Seconds from allocation to eviction.
    pub lifetime_seconds: f64,
    /// Seconds since the last observed transition.
    pub idle_seconds: f64,
    /// Transitions observed while tracked (cache publishes and frees).
    pub touch_count: usize,
}

struct TrackedBlock {
    birth: Instant,
    last_touch: Instant,
    touch_count: usize,
}

impl TrackedBlock {
    fn new() -> Self {
        let now = Instant::now();
        Self {
            birth: now,
            last_touch: now,
            touch_count: 0,
        }
    }

    fn touch(&mut self) {
        self.last_touch = Instant::now();
        self.touch_count += 1;
    }
}

/// `BlockObserver` that samples a fraction of allocations and reports
/// lifetime/idle timing when their cache entries are evicted.
pub struct SamplingBlockTracker {
    /// Sample rate in (0.0, 1.0]
    sample_rate: f64,
    tracked: HashMap<BlockId, TrackedBlock>,
    reports: Vec<BlockEvictionReport>,
    sample_counter: u64,
}

impl SamplingBlockTracker {
    /// # Panics
    /// Panics if `sample_rate` is not in (0.0, 1.0].
    pub fn new(sample_rate: f64) -> Self {
        assert!(
            sample_rate > 0.0 && sample_rate <= 1.0,
            "sample_rate must be in (0.0, 1.0], got {}",
            sample_rate
        );
        Self {
            sample_rate,
            tracked: HashMap::new(),
            reports: Vec::new(),
            sample_counter: 0,
        }
    }

    /// Deterministic sampling decision; no RNG so runs are reproducible.
    fn should_sample(&mut self) -> bool {
        if self.sample_rate >= 1.0 {
            return true;
        }
        self.sample_counter = self.sample_counter.wrapping_add(1);
        let threshold = (self.sample_rate * u64::MAX as f64) as u64;
        let mixed = self.sample_counter.wrapping_mul(0x9e3779b97f4a7c15);
        mixed < threshold
    }

    /// Drain all pending eviction reports.
    pub fn drain_reports(&mut self) -> Vec<BlockEvictionReport> {
        std::mem::take(&mut self.reports)
    }

    pub fn tracked_blocks(&self) -> usize {
        self.tracked.len()
    }

    pub fn reset(&mut self) {
        self.tracked.clear();
        self.reports.clear();
    }
}

impl BlockObserver for SamplingBlockTracker {
    fn on_block_allocated(&mut self, block_id: BlockId, _state: BlockState) {
        if self.should_sample() {
            self.tracked.insert(block_id, TrackedBlock::new());
        }
    }

    fn on_block_cached(&mut self, block_id: BlockId, _state: BlockState) {
        if let Some(tracked) = self.tracked.get_mut(&block_id) {
            tracked.touch();
        }
    }

    fn on_block_freed(&mut self, block_id: BlockId, _state: BlockState) {
        if let Some(tracked) = self.tracked.get_mut(&block_id) {
            tracked.touch();
        }
    }

    fn on_block_evicted(&mut self, block_id: BlockId, _state: BlockState) {
        if let Some(tracked) = self.tracked.remove(&block_id) {
            self.reports.push(BlockEvictionReport {
                block_id,
                lifetime_seconds: tracked.birth.elapsed().as_secs_f64(),
                idle_seconds: tracked.last_touch.elapsed().as_secs_f64(),
                touch_count: tracked.touch_count,
            });
        }
    }
}
