//! Block pool orchestrator.
//!
//! Owns the block table, the free list, and the prefix index, and enforces
//! the invariants between them: a non-sentinel block is in the free list
//! exactly when its ref count is zero, and a cache entry points at the one
//! block that currently holds its content.
//!
//! All mutating operations take `&mut self`; the single-mutator contract
//! is the caller's lock (or the borrow checker, for in-process use).

use std::collections::HashMap;
use std::sync::Arc;

use tracing::{debug, warn};

use crate::block_hash::{BlockHash, GroupId};
use crate::block_table::{Block, BlockId, BlockState, BlockTable, CacheKey};
use crate::config::CacheConfig;
use crate::error::CacheError;
use crate::events::BlockObserver;
use crate::free_list::FreeBlockList;
use crate::metrics::PoolMetrics;
use crate::prefix_cache::PrefixCacheIndex;

pub struct BlockPool {
    table: BlockTable,
    free_list: FreeBlockList,
    prefix_index: PrefixCacheIndex,
    block_size: usize,
    group_count: usize,
    /// Non-sentinel blocks with ref_count > 0; keeps usage() O(1).
    num_allocated: usize,
    metrics: Arc<PoolMetrics>,
    observer: Option<Box<dyn BlockObserver>>,
}

impl BlockPool {
    pub fn new(config: &CacheConfig) -> Result<Self, CacheError> {
        Self::with_metrics(config, Arc::new(PoolMetrics::new()))
    }

    /// Create a pool with a shared metrics instance.
    pub fn with_metrics(
        config: &CacheConfig,
        metrics: Arc<PoolMetrics>,
    ) -> Result<Self, CacheError> {
        config.validate()?;
        let mut table = BlockTable::new(config.capacity);
        let free_list = FreeBlockList::new(&mut table);
        Ok(Self {
            table,
            free_list,
            prefix_index: PrefixCacheIndex::new(),
            block_size: config.block_size,
            group_count: config.group_count,
            num_allocated: 0,
            metrics,
            observer: None,
        })
    }

    /// Install the transition observer. Callbacks are synchronous; the
    /// pool never waits on them.
    pub fn set_observer(&mut self, observer: Box<dyn BlockObserver>) {
        self.observer = Some(observer);
    }

    pub fn take_observer(&mut self) -> Option<Box<dyn BlockObserver>> {
        self.observer.take()
    }

    /// Allocate `count` blocks for a request whose cacheable prefix hashes
    /// are `block_hashes` (in chain order).
    ///
    /// The hash chain is walked first: every hit is re-referenced, and a
    /// hit on a free-but-cached block pulls it back out of the free list.
    /// The walk stops at the first miss or once `count` is satisfied; the
    /// remainder comes from the eviction end of the free list. A popped
    /// block still carrying a stale content hash has its cache entry
    /// removed before the slot is repurposed.
    ///
    /// All-or-nothing: when hits plus free blocks cannot cover `count`,
    /// fails with `OutOfMemory` and mutates nothing.
    pub fn allocate(
        &mut self,
        block_hashes: &[BlockHash],
        group_id: GroupId,
        count: usize,
    ) -> Result<Vec<BlockId>, CacheError> {
        debug_assert!(group_id < self.group_count, "group_id out of range");
        if count == 0 {
            return Ok(Vec::new());
        }

        // Read-only feasibility pass: find the hits and how many of them
        // would leave the free list, before touching any state.
        let mut hits: Vec<BlockId> = Vec::new();
        let mut free_hits = 0usize;
        for &hash in block_hashes.iter().take(count) {
            let key = CacheKey { hash, group_id };
            let Some(id) = self.prefix_index.lookup(key) else {
                break;
            };
            let block = &self.table.blocks[id];
            debug_assert_eq!(block.content_hash, Some(key));
            if block.ref_count == 0 {
                free_hits += 1;
            }
            hits.push(id);
        }

        let num_new = count - hits.len();
        let available_new = self.free_list.len() - free_hits;
        self.metrics.record_cache_query(hits.len(), num_new);
        if num_new > available_new {
            warn!(
                requested = count,
                available = hits.len() + available_new,
                "allocation failed: insufficient free blocks"
            );
            return Err(CacheError::OutOfMemory {
                requested: count,
                available: hits.len() + available_new,
            });
        }

        let mut allocated = Vec::with_capacity(count);

        // Commit the hits. A 0 -> 1 transition revives a free-but-cached
        // block, which must leave the free list.
        for &id in &hits {
            let revived = {
                let block = &mut self.table.blocks[id];
                block.ref_count += 1;
                block.ref_count == 1
            };
            if revived {
                self.free_list.remove(&mut self.table, id)?;
                self.num_allocated += 1;
                self.notify_allocated(id);
            }
            allocated.push(id);
        }

        // Pop the remainder, evicting stale cached content lazily: the
        // entry lives until the slot is actually handed to new data.
        let fresh = self.free_list.pop_front(&mut self.table, num_new)?;
        for &id in &fresh {
            if let Some(key) = self.table.blocks[id].content_hash.take() {
                self.prefix_index.remove(key);
                self.metrics.record_eviction(1);
                debug!(block_id = id, "evicted cached content for reuse");
                self.notify_evicted(id);
            }
            self.table.blocks[id].ref_count = 1;
            self.num_allocated += 1;
            self.notify_allocated(id);
            allocated.push(id);
        }

        self.metrics.record_allocation(allocated.len());
        Ok(allocated)
    }

    /// Publish a block whose token slots are full.
    ///
    /// Requires the block to be allocated and not yet cached. Nothing is
    /// mutated on any error path, so an `AlreadyCached` rejection is safe
    /// for callers that consider re-caching benign.
    pub fn mark_complete_and_cache(
        &mut self,
        block_id: BlockId,
        hash: BlockHash,
        group_id: GroupId,
    ) -> Result<(), CacheError> {
        debug_assert!(group_id < self.group_count, "group_id out of range");
        let capacity = self.table.capacity();
        let block = self.table.get(block_id)?;
        if block.is_sentinel {
            return Err(CacheError::InvalidBlockId { block_id, capacity });
        }
        if block.ref_count == 0 {
            return Err(CacheError::BlockNotAllocated { block_id });
        }
        if block.content_hash.is_some() {
            return Err(CacheError::AlreadyCached { block_id });
        }

        let key = CacheKey { hash, group_id };
        self.prefix_index.insert(key, block_id)?;
        self.table.blocks[block_id].content_hash = Some(key);
        self.metrics.record_cached(1);
        self.notify_cached(block_id);
        Ok(())
    }

    /// Release one reference per listed block.
    ///
    /// Blocks reaching zero references go to the back of the free list;
    /// their cache entries stay (free-but-cached). Freeing order is the
    /// caller's eviction-priority choice: blocks freed first are evicted
    /// first.
    pub fn free(&mut self, block_ids: &[BlockId]) -> Result<(), CacheError> {
        // Validate the whole batch first (including repeats of one id) so
        // an error cannot leave it half-applied.
        let mut claims: HashMap<BlockId, u32> = HashMap::new();
        for &id in block_ids {
            let block = self.table.get(id)?;
            if block.is_sentinel {
                return Err(CacheError::InvalidBlockId {
                    block_id: id,
                    capacity: self.table.capacity(),
                });
            }
            let claimed = claims.entry(id).or_insert(0);
            *claimed += 1;
            if *claimed > block.ref_count {
                return Err(CacheError::DoubleFree { block_id: id });
            }
        }

        let mut released = 0usize;
        for &id in block_ids {
            let freed = {
                let block = &mut self.table.blocks[id];
                block.ref_count -= 1;
                block.ref_count == 0
            };
            if freed {
                self.free_list.push_back(&mut self.table, id);
                self.num_allocated -= 1;
                self.notify_freed(id);
                released += 1;
            }
        }
        self.metrics.record_free(released);
        Ok(())
    }

    /// Add a reference to blocks the caller already matched, reviving any
    /// that sit free-but-cached in the free list.
    pub fn touch(&mut self, block_ids: &[BlockId]) -> Result<(), CacheError> {
        for &id in block_ids {
            let block = self.table.get(id)?;
            if block.is_sentinel {
                return Err(CacheError::InvalidBlockId {
                    block_id: id,
                    capacity: self.table.capacity(),
                });
            }
        }
        for &id in block_ids {
            let revived = {
                let block = &mut self.table.blocks[id];
                block.ref_count += 1;
                block.ref_count == 1
            };
            if revived {
                self.free_list.remove(&mut self.table, id)?;
                self.num_allocated += 1;
                self.notify_allocated(id);
            }
        }
        Ok(())
    }

    /// Drop cache entries for unreferenced blocks; entries whose block is
    /// still in use are kept. Returns the number of entries dropped.
    pub fn reset_prefix_cache(&mut self) -> usize {
        let stale: Vec<(CacheKey, BlockId)> = self
            .prefix_index
            .entries()
            .filter(|&(_, id)| self.table.blocks[id].ref_count == 0)
            .collect();
        for &(key, id) in &stale {
            self.prefix_index.remove(key);
            self.table.blocks[id].content_hash = None;
            self.notify_evicted(id);
        }
        self.metrics.record_eviction(stale.len());

        let remaining = self.prefix_index.len();
        if remaining > 0 {
            warn!(
                remaining,
                "prefix cache reset left entries for blocks still in use"
            );
        }
        stale.len()
    }

    /// Fraction of non-sentinel blocks currently referenced. O(1).
    pub fn usage(&self) -> f64 {
        self.num_allocated as f64 / (self.table.capacity() - 1) as f64
    }

    /// Read-only prefix index probe.
    pub fn lookup_cached_block(&self, hash: BlockHash, group_id: GroupId) -> Option<BlockId> {
        self.prefix_index.lookup(CacheKey { hash, group_id })
    }

    pub fn get(&self, block_id: BlockId) -> Result<&Block, CacheError> {
        self.table.get(block_id)
    }

    pub fn block_state(&self, block_id: BlockId) -> Result<BlockState, CacheError> {
        Ok(self.table.get(block_id)?.state())
    }

    pub fn num_free_blocks(&self) -> usize {
        self.free_list.len()
    }

    pub fn num_cached_blocks(&self) -> usize {
        self.prefix_index.len()
    }

    pub fn capacity(&self) -> usize {
        self.table.capacity()
    }

    pub fn num_usable_blocks(&self) -> usize {
        self.table.capacity() - 1
    }

    pub fn block_size(&self) -> usize {
        self.block_size
    }

    pub fn group_count(&self) -> usize {
        self.group_count
    }

    pub fn metrics(&self) -> &Arc<PoolMetrics> {
        &self.metrics
    }

    #[cfg(test)]
    pub(crate) fn free_block_ids(&self) -> Vec<BlockId> {
        self.free_list.iter(&self.table).collect()
    }

    #[cfg(test)]
    pub(crate) fn in_free_list(&self, id: BlockId) -> bool {
        self.free_list.contains(&self.table, id)
    }

    fn notify_allocated(&mut self, id: BlockId) {
        if let Some(observer) = self.observer.as_deref_mut() {
            observer.on_block_allocated(id, self.table.blocks[id].state());
        }
    }

    fn notify_freed(&mut self, id: BlockId) {
        if let Some(observer) = self.observer.as_deref_mut() {
            observer.on_block_freed(id, self.table.blocks[id].state());
        }
    }

    fn notify_cached(&mut self, id: BlockId) {
        if let Some(observer) = self.observer.as_deref_mut() {
            observer.on_block_cached(id, self.table.blocks[id].state());
        }
    }

    fn notify_evicted(&mut self, id: BlockId) {
        if let Some(observer) = self.observer.as_deref_mut() {
            observer.on_block_evicted(id, self.table.blocks[id].state());
        }
    }
}
