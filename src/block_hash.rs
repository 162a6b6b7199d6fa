//! Chained per-block content hashing.
//!
//! The hash of block k covers the hash of block k-1, so equal hashes imply
//! equal prefixes, not just equal block contents. Longest-prefix lookup is
//! a forward walk over these hashes that stops at the first miss.

use std::hash::{Hash, Hasher};

pub type BlockHash = u64;
pub type GroupId = usize;

/// Stands in for the parent hash of the first block in a chain, so an
/// absent parent hashes differently from a parent hash that happens to be
/// zero. Fixed, so hashes are stable across runs.
const CHAIN_SEED: u64 = 0xa076_1d64_78bd_642f;

/// Hash a single full block from its parent hash, token ids, and optional
/// request-context salt (adapter or modality id). The salt prevents
/// cross-context false matches on identical token sequences.
pub fn hash_block(parent: Option<BlockHash>, token_ids: &[u32], salt: Option<u64>) -> BlockHash {
    let mut hasher = std::collections::hash_map::DefaultHasher::new();
    parent.unwrap_or(CHAIN_SEED).hash(&mut hasher);
    salt.hash(&mut hasher);
    for &t in token_ids {
        t.hash(&mut hasher);
    }
    hasher.finish()
}

/// Compute the hash chain for a request's tokens.
///
/// Only completely filled blocks are hashed; a partial tail block is never
/// cacheable and gets no entry.
pub fn hash_request_tokens(
    token_ids: &[u32],
    block_size: usize,
    salt: Option<u64>,
) -> Vec<BlockHash> {
    debug_assert!(block_size > 0);
    let mut hashes = Vec::with_capacity(token_ids.len() / block_size);
    let mut parent = None;
    for chunk in token_ids.chunks(block_size) {
        if chunk.len() < block_size {
            break;
        }
        let hash = hash_block(parent, chunk, salt);
        hashes.push(hash);
        parent = Some(hash);
    }
    hashes
}
