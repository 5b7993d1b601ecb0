//! Micro-operation benchmarks for the global cache.
//!
//! Run with: `cargo bench --bench cache_ops`
//!
//! Measures get-hit, get-miss and set latency, plus set under constant
//! eviction once the cache is full.

use std::hint::black_box;
use std::sync::atomic::{AtomicU64, Ordering};

use confref::cache::{CacheConfig, GlobalCache, SetOptions};
use criterion::{criterion_group, criterion_main, Criterion, Throughput};
use serde_json::json;
use tokio::runtime::Runtime;

const CAPACITY: usize = 4_096;

fn bench_config(max_entries: usize) -> CacheConfig {
    CacheConfig::builder()
        .max_entries(max_entries)
        .min_cache_size(0)
        .enable_auto_cleanup(false)
        .enable_memory_monitoring(false)
        .build()
}

fn filled_cache(rt: &Runtime) -> GlobalCache {
    let cache = GlobalCache::new(bench_config(CAPACITY));
    rt.block_on(async {
        for i in 0..CAPACITY {
            cache
                .set(format!("ssm:/bench/{}", i), json!("value"), SetOptions::new("ssm"))
                .await;
        }
    });
    cache
}

fn bench_get(c: &mut Criterion) {
    let rt = Runtime::new().expect("tokio runtime");
    let cache = filled_cache(&rt);
    let counter = AtomicU64::new(0);

    let mut group = c.benchmark_group("get");
    group.throughput(Throughput::Elements(1));

    group.bench_function("hit", |b| {
        b.to_async(&rt).iter(|| async {
            let i = counter.fetch_add(1, Ordering::Relaxed) as usize % CAPACITY;
            black_box(cache.get(&format!("ssm:/bench/{}", i)).await)
        })
    });

    group.bench_function("miss", |b| {
        b.to_async(&rt)
            .iter(|| async { black_box(cache.get("ssm:/bench/absent").await) })
    });

    group.finish();
}

fn bench_set(c: &mut Criterion) {
    let rt = Runtime::new().expect("tokio runtime");
    let counter = AtomicU64::new(0);

    let mut group = c.benchmark_group("set");
    group.throughput(Throughput::Elements(1));

    let roomy = GlobalCache::new(bench_config(1_000_000));
    group.bench_function("insert", |b| {
        b.to_async(&rt).iter(|| async {
            let i = counter.fetch_add(1, Ordering::Relaxed);
            black_box(
                roomy
                    .set(format!("ssm:/insert/{}", i), json!("value"), SetOptions::new("ssm"))
                    .await,
            )
        })
    });

    // every insert past capacity scores and evicts
    let full = filled_cache(&rt);
    group.bench_function("insert_with_eviction", |b| {
        b.to_async(&rt).iter(|| async {
            let i = counter.fetch_add(1, Ordering::Relaxed);
            black_box(
                full.set(format!("ssm:/evict/{}", i), json!("value"), SetOptions::new("ssm"))
                    .await,
            )
        })
    });

    group.finish();
}

criterion_group!(benches, bench_get, bench_set);
criterion_main!(benches);
