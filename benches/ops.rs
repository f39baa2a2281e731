//! Micro-operation benchmarks for the cache hot paths.
//!
//! Run with: `cargo bench --bench ops`
//!
//! Measures per-operation latency (nanoseconds) for find, insert-with-replace
//! and bump under a warm cache, plus the eviction-heavy churn path.

use std::hint::black_box;
use std::time::Instant;

use criterion::{criterion_group, criterion_main, Criterion, Throughput};
use slabcache::{Cache, CacheConfig};

const ITEMS: u64 = 16_384;
const OPS: u64 = 100_000;

fn bench_cache() -> Cache {
    Cache::new(CacheConfig {
        max_memory_bytes: 64 * 1024 * 1024,
        table_bucket_count: 32 * 1024,
        ..Default::default()
    })
    .unwrap()
}

fn key(i: u64) -> [u8; 8] {
    i.to_le_bytes()
}

fn fill(cache: &Cache, items: u64) {
    for i in 0..items {
        let handle = cache.allocate(&key(i), &[0u8; 64], 1 << 40).unwrap();
        cache.insert(handle);
    }
}

// ============================================================================
// Find Hit Latency (ns/op)
// ============================================================================

fn bench_find_hit(c: &mut Criterion) {
    let mut group = c.benchmark_group("find_hit_ns");
    group.throughput(Throughput::Elements(OPS));

    group.bench_function("find_release", |b| {
        b.iter_custom(|iters| {
            let cache = bench_cache();
            fill(&cache, ITEMS);
            let start = Instant::now();
            for _ in 0..iters {
                for i in 0..OPS {
                    let handle = cache.find(&key(i % ITEMS), 1).unwrap();
                    black_box(handle.value());
                    cache.release(handle);
                }
            }
            start.elapsed()
        })
    });

    group.bench_function("find_bump", |b| {
        b.iter_custom(|iters| {
            let cache = bench_cache();
            fill(&cache, ITEMS);
            let start = Instant::now();
            for _ in 0..iters {
                for i in 0..OPS {
                    let handle = cache.find(&key(i % ITEMS), 1).unwrap();
                    cache.bump(handle, 1);
                }
            }
            start.elapsed()
        })
    });

    group.finish();
}

// ============================================================================
// Insert Latency (ns/op)
// ============================================================================

fn bench_insert(c: &mut Criterion) {
    let mut group = c.benchmark_group("insert_ns");
    group.throughput(Throughput::Elements(OPS));

    group.bench_function("insert_replace", |b| {
        b.iter_custom(|iters| {
            let cache = bench_cache();
            fill(&cache, ITEMS);
            let start = Instant::now();
            for _ in 0..iters {
                for i in 0..OPS {
                    let handle = cache
                        .allocate(&key(i % ITEMS), &[1u8; 64], 1 << 40)
                        .unwrap();
                    cache.insert(handle);
                }
            }
            start.elapsed()
        })
    });

    group.finish();
}

// ============================================================================
// Eviction Churn (ns/op)
// ============================================================================
//
// Working set far above capacity: every allocation runs the eviction scan
// after the initial fill, measuring the full reclaim path.

fn bench_churn(c: &mut Criterion) {
    let mut group = c.benchmark_group("churn_ns");
    group.throughput(Throughput::Elements(OPS));

    group.bench_function("allocate_evict_insert", |b| {
        b.iter_custom(|iters| {
            let cache = Cache::new(CacheConfig {
                max_memory_bytes: 1024 * 1024,
                table_bucket_count: 4096,
                ..Default::default()
            })
            .unwrap();
            let start = Instant::now();
            for _ in 0..iters {
                for i in 0..OPS {
                    if let Ok(handle) = cache.allocate(&key(i), &[0u8; 64], 1 << 40) {
                        cache.insert(handle);
                    }
                    if i % 1024 == 0 {
                        cache.sweep(1);
                    }
                }
            }
            start.elapsed()
        })
    });

    group.finish();
}

criterion_group!(benches, bench_find_hit, bench_insert, bench_churn);
criterion_main!(benches);
