//! Block-granular KV cache allocator with content-addressed prefix reuse.
//!
//! A bounded pool of equally sized blocks is handed out to requests,
//! reclaimed on completion, and opportunistically shared across requests
//! with identical token prefixes. Freed blocks keep their cached content
//! until the slot is actually repurposed, so a request arriving shortly
//! after another finishes can still reuse its prefix.
//!
//! The pool does pure bookkeeping: tensor storage, attention computation,
//! and scheduling live with the caller. All mutating operations are
//! synchronous, bounded-time, and meant to be serialized by one caller.

pub mod block_hash;
mod block_pool;
mod block_table;
pub mod config;
mod error;
pub mod events;
mod free_list;
pub mod metrics;
mod prefix_cache;

pub use block_hash::{hash_block, hash_request_tokens, BlockHash, GroupId};
pub use block_pool::BlockPool;
pub use block_table::{Block, BlockId, BlockState, BlockTable, CacheKey};
pub use config::CacheConfig;
pub use error::CacheError;
pub use events::{BlockEvictionReport, BlockObserver, SamplingBlockTracker};
pub use free_list::FreeBlockList;
pub use metrics::{MetricsSnapshot, PoolMetrics};
pub use prefix_cache::PrefixCacheIndex;

/// Fans out allocate/free calls across independent per-attention-type
/// pools.
///
/// Attention mechanisms with different block sizes get their own
/// `BlockPool`; groups that share a block size share one pool through its
/// `(hash, group_id)` namespace. Request-to-block bookkeeping stays with
/// the scheduler; this type only routes.
pub struct KVCacheCoordinator {
    pools: Vec<BlockPool>,
}

impl KVCacheCoordinator {
    pub fn new(configs: &[CacheConfig]) -> Result<Self, CacheError> {
        if configs.is_empty() {
            return Err(CacheError::InvalidConfig {
                reason: "at least one pool config required".into(),
            });
        }
        let mut pools = Vec::with_capacity(configs.len());
        for config in configs {
            pools.push(BlockPool::new(config)?);
        }
        Ok(Self { pools })
    }

    pub fn num_pools(&self) -> usize {
        self.pools.len()
    }

    pub fn pool(&self, pool_idx: usize) -> &BlockPool {
        &self.pools[pool_idx]
    }

    pub fn pool_mut(&mut self, pool_idx: usize) -> &mut BlockPool {
        &mut self.pools[pool_idx]
    }

    /// Allocate enough blocks in one pool to hold `token_count` tokens,
    /// reusing cached prefix blocks where the hash chain matches.
    pub fn allocate_slots(
        &mut self,
        pool_idx: usize,
        block_hashes: &[BlockHash],
        group_id: GroupId,
        token_count: usize,
    ) -> Result<Vec<BlockId>, CacheError> {
        let pool = &mut self.pools[pool_idx];
        let count = token_count.div_ceil(pool.block_size());
        pool.allocate(block_hashes, group_id, count)
    }

    pub fn free(&mut self, pool_idx: usize, block_ids: &[BlockId]) -> Result<(), CacheError> {
        self.pools[pool_idx].free(block_ids)
    }

    /// Per-pool usage fractions, in pool order.
    pub fn usage(&self) -> Vec<f64> {
        self.pools.iter().map(BlockPool::usage).collect()
    }
}
