//! Criterion benchmarks for the block pool hot paths.
//!
//! Covers the allocate/free cycle without caching and the prefix-hit walk
//! where every requested block is already cached.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};

use kv_block_pool::{hash_request_tokens, BlockHash, BlockPool, CacheConfig};

const BLOCK_SIZE: usize = 16;

/// Build a deterministic token sequence covering `num_blocks` full blocks.
fn make_tokens(num_blocks: usize) -> Vec<u32> {
    (0..num_blocks * BLOCK_SIZE).map(|i| (i * 7 + 3) as u32).collect()
}

fn make_pool(num_blocks: usize) -> BlockPool {
    let config = CacheConfig::new(num_blocks + 1, BLOCK_SIZE, 1).unwrap();
    BlockPool::new(&config).unwrap()
}

/// Pool whose prefix index already holds a chain of `num_blocks` hashes.
fn make_warm_pool(hashes: &[BlockHash]) -> BlockPool {
    let mut pool = make_pool(hashes.len() * 2);
    let ids = pool.allocate(hashes, 0, hashes.len()).unwrap();
    for (i, &id) in ids.iter().enumerate() {
        pool.mark_complete_and_cache(id, hashes[i], 0).unwrap();
    }
    pool.free(&ids).unwrap();
    pool
}

fn bench_allocate_free_cycle(c: &mut Criterion) {
    let mut group = c.benchmark_group("allocate_free_cycle");

    for &num_blocks in &[16, 256, 4096] {
        let mut pool = make_pool(num_blocks);
        group.bench_with_input(
            BenchmarkId::new("blocks", num_blocks),
            &num_blocks,
            |b, &n| {
                b.iter(|| {
                    let ids = pool.allocate(black_box(&[]), 0, n).unwrap();
                    pool.free(&ids).unwrap();
                });
            },
        );
    }
    group.finish();
}

fn bench_prefix_hit_walk(c: &mut Criterion) {
    let mut group = c.benchmark_group("prefix_hit_walk");

    for &num_blocks in &[4, 64, 512] {
        let tokens = make_tokens(num_blocks);
        let hashes = hash_request_tokens(&tokens, BLOCK_SIZE, None);
        let mut pool = make_warm_pool(&hashes);
        group.bench_with_input(
            BenchmarkId::new("blocks", num_blocks),
            &num_blocks,
            |b, &n| {
                b.iter(|| {
                    let ids = pool.allocate(black_box(&hashes), 0, n).unwrap();
                    pool.free(&ids).unwrap();
                });
            },
        );
    }
    group.finish();
}

fn bench_hash_chain(c: &mut Criterion) {
    let mut group = c.benchmark_group("hash_request_tokens");

    for &num_blocks in &[4, 64, 512] {
        let tokens = make_tokens(num_blocks);
        group.bench_with_input(
            BenchmarkId::new("blocks", num_blocks),
            &num_blocks,
            |b, _| {
                b.iter(|| hash_request_tokens(black_box(&tokens), BLOCK_SIZE, None));
            },
        );
    }
    group.finish();
}

criterion_group!(
    benches,
    bench_allocate_free_cycle,
    bench_prefix_hit_walk,
    bench_hash_chain
);
criterion_main!(benches);
