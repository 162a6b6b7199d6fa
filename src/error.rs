use thiserror::Error;

#[derive(Error, Debug)]
pub enum CacheError {
    #[error("out of memory: requested {requested} blocks, {available} obtainable")]
    OutOfMemory { requested: usize, available: usize },

    #[error("block id {block_id} outside the allocatable range (capacity {capacity})")]
    InvalidBlockId { block_id: usize, capacity: usize },

    #[error("double free of block {block_id}")]
    DoubleFree { block_id: usize },

    #[error("insufficient free blocks: requested {requested}, available {available}")]
    InsufficientFreeBlocks { requested: usize, available: usize },

    #[error("content hash already cached by block {block_id}")]
    HashAlreadyCached { block_id: usize },

    #[error("block {block_id} already carries a content hash")]
    AlreadyCached { block_id: usize },

    #[error("block {block_id} is not in the free list")]
    NotInFreeList { block_id: usize },

    #[error("block {block_id} is not allocated")]
    BlockNotAllocated { block_id: usize },

    #[error("invalid cache config: {reason}")]
    InvalidConfig { reason: String },
}
