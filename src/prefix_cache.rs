//! Content-addressed index: `(content_hash, group_id)` to block id.
//!
//! The index holds at most one block per key. Entries outlive the freeing
//! of their block (free-but-cached) and are removed only when the block's
//! content is invalidated or the pool resets.

use std::collections::HashMap;

use crate::block_table::{BlockId, CacheKey};
use crate::error::CacheError;

#[derive(Default)]
pub struct PrefixCacheIndex {
    entries: HashMap<CacheKey, BlockId>,
}

impl PrefixCacheIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Publish a block under `key`.
    ///
    /// Re-inserting the same block under the same key is a no-op. A key
    /// already mapped to a *different* block means a hashing bug or a true
    /// content collision and is rejected.
    pub fn insert(&mut self, key: CacheKey, block_id: BlockId) -> Result<(), CacheError> {
        match self.entries.get(&key) {
            Some(&existing) if existing != block_id => {
                Err(CacheError::HashAlreadyCached { block_id: existing })
            }
            Some(_) => Ok(()),
            None => {
                self.entries.insert(key, block_id);
                Ok(())
            }
        }
    }

    pub fn lookup(&self, key: CacheKey) -> Option<BlockId> {
        self.entries.get(&key).copied()
    }

    /// Delete the entry for `key`; no-op when absent.
    pub fn remove(&mut self, key: CacheKey) {
        self.entries.remove(&key);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> impl Iterator<Item = (CacheKey, BlockId)> + '_ {
        self.entries.iter().map(|(&key, &id)| (key, id))
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(hash: u64, group_id: usize) -> CacheKey {
        CacheKey { hash, group_id }
    }

    #[test]
    fn insert_and_lookup() {
        let mut index = PrefixCacheIndex::new();
        index.insert(key(0x11, 0), 3).unwrap();

        assert_eq!(index.lookup(key(0x11, 0)), Some(3));
        assert_eq!(index.lookup(key(0x22, 0)), None);
        assert_eq!(index.len(), 1);
    }

    #[test]
    fn group_id_partitions_namespace() {
        let mut index = PrefixCacheIndex::new();
        index.insert(key(0x11, 0), 3).unwrap();
        index.insert(key(0x11, 1), 7).unwrap();

        assert_eq!(index.lookup(key(0x11, 0)), Some(3));
        assert_eq!(index.lookup(key(0x11, 1)), Some(7));
        assert_eq!(index.len(), 2);
    }

    #[test]
    fn reinsert_same_block_is_noop() {
        let mut index = PrefixCacheIndex::new();
        index.insert(key(0x11, 0), 3).unwrap();
        index.insert(key(0x11, 0), 3).unwrap();
        assert_eq!(index.len(), 1);
    }

    #[test]
    fn conflicting_insert_rejected() {
        let mut index = PrefixCacheIndex::new();
        index.insert(key(0x11, 0), 3).unwrap();

        let err = index.insert(key(0x11, 0), 5).unwrap_err();
        assert!(matches!(err, CacheError::HashAlreadyCached { block_id: 3 }));
        // Original mapping untouched
        assert_eq!(index.lookup(key(0x11, 0)), Some(3));
    }

    #[test]
    fn remove_is_idempotent() {
        let mut index = PrefixCacheIndex::new();
        index.insert(key(0x11, 0), 3).unwrap();

        index.remove(key(0x11, 0));
        assert_eq!(index.lookup(key(0x11, 0)), None);

        index.remove(key(0x11, 0)); // absent: no-op
        assert!(index.is_empty());
    }

    #[test]
    fn clear_drops_everything() {
        let mut index = PrefixCacheIndex::new();
        index.insert(key(0x11, 0), 1).unwrap();
        index.insert(key(0x22, 0), 2).unwrap();

        index.clear();
        assert!(index.is_empty());
        assert_eq!(index.lookup(key(0x11, 0)), None);
    }
}
