use crate::block_hash::{BlockHash, GroupId};
use crate::error::CacheError;

pub type BlockId = usize;

/// Link slot value meaning "no neighbor".
pub(crate) const NONE: usize = usize::MAX;

/// Key under which a completed block is published in the prefix index.
///
/// The group id is part of the key so distinct attention-cache groups can
/// share one hashing namespace without false matches. Storing the full key
/// on the block makes index removal O(1) when the block is repurposed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub hash: BlockHash,
    pub group_id: GroupId,
}

/// Lifecycle state of a non-sentinel block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockState {
    FreeUncached,
    AllocatedUncached,
    AllocatedCached,
    FreeCached,
}

/// One record in the block table.
///
/// `prev_free`/`next_free` are meaningful only while `in_free_list` is set;
/// the free list threads through these slots instead of separate nodes.
#[derive(Debug)]
pub struct Block {
    pub(crate) id: BlockId,
    pub(crate) ref_count: u32,
    pub(crate) content_hash: Option<CacheKey>,
    pub(crate) prev_free: usize,
    pub(crate) next_free: usize,
    pub(crate) in_free_list: bool,
    pub(crate) is_sentinel: bool,
}

impl Block {
    fn new(id: BlockId, is_sentinel: bool) -> Self {
        Self {
            id,
            // The sentinel is permanently allocated and never freed.
            ref_count: u32::from(is_sentinel),
            content_hash: None,
            prev_free: NONE,
            next_free: NONE,
            in_free_list: false,
            is_sentinel,
        }
    }

    pub fn id(&self) -> BlockId {
        self.id
    }

    pub fn ref_count(&self) -> u32 {
        self.ref_count
    }

    pub fn content_hash(&self) -> Option<CacheKey> {
        self.content_hash
    }

    pub fn is_sentinel(&self) -> bool {
        self.is_sentinel
    }

    pub(crate) fn in_free_list(&self) -> bool {
        self.in_free_list
    }

    pub fn state(&self) -> BlockState {
        match (self.ref_count > 0, self.content_hash.is_some()) {
            (false, false) => BlockState::FreeUncached,
            (true, false) => BlockState::AllocatedUncached,
            (true, true) => BlockState::AllocatedCached,
            (false, true) => BlockState::FreeCached,
        }
    }
}

/// Fixed-size arena of block records, created once at pool construction.
///
/// Block 0 is the sentinel: permanently allocated, never linked into the
/// free list, never published in the prefix index.
pub struct BlockTable {
    pub(crate) blocks: Vec<Block>,
}

impl BlockTable {
    pub fn new(capacity: usize) -> Self {
        debug_assert!(capacity >= 2, "capacity must cover sentinel + one block");
        let blocks = (0..capacity).map(|id| Block::new(id, id == 0)).collect();
        Self { blocks }
    }

    pub fn capacity(&self) -> usize {
        self.blocks.len()
    }

    pub fn get(&self, id: BlockId) -> Result<&Block, CacheError> {
        self.blocks
            .get(id)
            .ok_or(CacheError::InvalidBlockId {
                block_id: id,
                capacity: self.blocks.len(),
            })
    }

    pub fn get_mut(&mut self, id: BlockId) -> Result<&mut Block, CacheError> {
        let capacity = self.blocks.len();
        self.blocks
            .get_mut(id)
            .ok_or(CacheError::InvalidBlockId {
                block_id: id,
                capacity,
            })
    }

    /// Iterate all records in id order.
    pub fn iter(&self) -> impl Iterator<Item = &Block> {
        self.blocks.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_table_marks_sentinel() {
        let table = BlockTable::new(4);
        assert_eq!(table.capacity(), 4);

        let sentinel = table.get(0).unwrap();
        assert!(sentinel.is_sentinel());
        assert_eq!(sentinel.ref_count(), 1);

        for id in 1..4 {
            let block = table.get(id).unwrap();
            assert!(!block.is_sentinel());
            assert_eq!(block.ref_count(), 0);
            assert_eq!(block.content_hash(), None);
        }
    }

    #[test]
    fn get_out_of_range_fails() {
        let table = BlockTable::new(4);
        let err = table.get(4).unwrap_err();
        match err {
            CacheError::InvalidBlockId { block_id, capacity } => {
                assert_eq!(block_id, 4);
                assert_eq!(capacity, 4);
            }
            other => panic!("wrong error variant: {other}"),
        }
    }

    #[test]
    fn get_mut_out_of_range_fails() {
        let mut table = BlockTable::new(4);
        assert!(table.get_mut(99).is_err());
    }

    #[test]
    fn state_follows_refcount_and_hash() {
        let mut table = BlockTable::new(3);
        let key = CacheKey {
            hash: 0xabcd,
            group_id: 0,
        };

        let block = table.get_mut(1).unwrap();
        assert_eq!(block.state(), BlockState::FreeUncached);

        block.ref_count = 1;
        assert_eq!(block.state(), BlockState::AllocatedUncached);

        block.content_hash = Some(key);
        assert_eq!(block.state(), BlockState::AllocatedCached);

        block.ref_count = 0;
        assert_eq!(block.state(), BlockState::FreeCached);
    }

    #[test]
    fn ids_match_positions() {
        let table = BlockTable::new(5);
        for (i, block) in table.iter().enumerate() {
            assert_eq!(block.id(), i);
        }
    }
}
