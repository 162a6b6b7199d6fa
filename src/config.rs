use crate::error::CacheError;

/// Pool construction parameters.
///
/// `capacity` counts the sentinel block, so a pool built from this config
/// hands out at most `capacity - 1` blocks.
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// Total number of block records, including the sentinel (block 0).
    pub capacity: usize,
    /// Token slots per block.
    pub block_size: usize,
    /// Number of hashing namespaces sharing this pool's prefix index.
    pub group_count: usize,
}

impl CacheConfig {
    pub fn new(capacity: usize, block_size: usize, group_count: usize) -> Result<Self, CacheError> {
        let config = Self {
            capacity,
            block_size,
            group_count,
        };
        config.validate()?;
        Ok(config)
    }

    /// Compute capacity from a byte budget.
    ///
    /// `bytes_per_block` is the full per-block footprint across all layers,
    /// supplied by the caller since tensor dtype and layout live outside
    /// this crate.
    pub fn from_memory_budget(
        budget_bytes: usize,
        bytes_per_block: usize,
        block_size: usize,
        group_count: usize,
    ) -> Result<Self, CacheError> {
        if bytes_per_block == 0 {
            return Err(CacheError::InvalidConfig {
                reason: "bytes_per_block must be positive".into(),
            });
        }
        Self::new(budget_bytes / bytes_per_block, block_size, group_count)
    }

    pub fn validate(&self) -> Result<(), CacheError> {
        if self.capacity < 2 {
            return Err(CacheError::InvalidConfig {
                reason: format!(
                    "capacity must be at least 2 (sentinel + one usable block), got {}",
                    self.capacity
                ),
            });
        }
        if self.block_size == 0 {
            return Err(CacheError::InvalidConfig {
                reason: "block_size must be positive".into(),
            });
        }
        if self.group_count == 0 {
            return Err(CacheError::InvalidConfig {
                reason: "group_count must be positive".into(),
            });
        }
        Ok(())
    }

    /// Blocks available to requests (everything but the sentinel).
    pub fn num_usable_blocks(&self) -> usize {
        self.capacity - 1
    }

    /// Blocks required to hold `token_count` tokens.
    pub fn blocks_for_tokens(&self, token_count: usize) -> usize {
        token_count.div_ceil(self.block_size)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn valid_config() {
        let config = CacheConfig::new(64, 16, 1).unwrap();
        assert_eq!(config.capacity, 64);
        assert_eq!(config.num_usable_blocks(), 63);
    }

    #[test]
    fn capacity_must_cover_sentinel_plus_one() {
        assert!(CacheConfig::new(0, 16, 1).is_err());
        assert!(CacheConfig::new(1, 16, 1).is_err());
        assert!(CacheConfig::new(2, 16, 1).is_ok());
    }

    #[test]
    fn zero_block_size_rejected() {
        let err = CacheConfig::new(8, 0, 1).unwrap_err();
        assert!(matches!(err, CacheError::InvalidConfig { .. }));
    }

    #[test]
    fn zero_group_count_rejected() {
        assert!(CacheConfig::new(8, 16, 0).is_err());
    }

    #[test]
    fn from_memory_budget_computes_capacity() {
        // 1 MiB budget, 64 KiB per block -> 16 blocks total
        let config = CacheConfig::from_memory_budget(1 << 20, 64 << 10, 16, 1).unwrap();
        assert_eq!(config.capacity, 16);
        assert_eq!(config.num_usable_blocks(), 15);
    }

    #[test]
    fn from_memory_budget_too_small_rejected() {
        // Budget covers a single block: no room for sentinel + usable
        assert!(CacheConfig::from_memory_budget(64 << 10, 64 << 10, 16, 1).is_err());
    }

    #[test]
    fn blocks_for_tokens_rounds_up() {
        let config = CacheConfig::new(8, 4, 1).unwrap();
        assert_eq!(config.blocks_for_tokens(0), 0);
        assert_eq!(config.blocks_for_tokens(1), 1);
        assert_eq!(config.blocks_for_tokens(4), 1);
        assert_eq!(config.blocks_for_tokens(10), 3);
    }
}
