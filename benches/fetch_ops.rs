//! Benchmark suite for coalescing cache fetches.

use coalescing_cache::sync::Cache;
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use std::{
    collections::{HashMap, HashSet},
    convert::Infallible,
    time::Duration,
};

fn lookup(keys: HashSet<u64>) -> Result<HashMap<u64, String>, Infallible> {
    Ok(keys.into_iter().map(|k| (k, format!("value-{}", k))).collect())
}

/// Benchmark fetches whose keys are all cached.
///
/// Tests batch sizes: 1, 10, and 100 keys.
fn fetch_cached_benchmark(c: &mut Criterion) {
    let mut group = c.benchmark_group("fetch_cached");

    for size in [1u64, 10, 100].iter() {
        let cache = Cache::new(lookup);
        cache.fetch(0..*size).unwrap();

        group.throughput(Throughput::Elements(*size));
        group.bench_with_input(BenchmarkId::from_parameter(size), size, |b, &size| {
            b.iter(|| black_box(cache.fetch(black_box(0..size)).unwrap()));
        });
    }
    group.finish();
}

/// Benchmark fetches against an empty cache, so every key goes to the fetcher.
fn fetch_missing_benchmark(c: &mut Criterion) {
    let mut group = c.benchmark_group("fetch_missing");

    for size in [1u64, 10, 100].iter() {
        group.throughput(Throughput::Elements(*size));
        group.bench_with_input(BenchmarkId::from_parameter(size), size, |b, &size| {
            b.iter(|| {
                let cache = Cache::new(lookup);
                black_box(cache.fetch(black_box(0..size)).unwrap())
            });
        });
    }
    group.finish();
}

/// Benchmark fetches where half of the keys are cached.
fn fetch_partial_benchmark(c: &mut Criterion) {
    let mut group = c.benchmark_group("fetch_partial");

    for size in [10u64, 100].iter() {
        group.throughput(Throughput::Elements(*size));
        group.bench_with_input(BenchmarkId::from_parameter(size), size, |b, &size| {
            b.iter(|| {
                let cache = Cache::new(lookup);
                cache.fetch(0..size / 2).unwrap();
                black_box(cache.fetch(black_box(0..size)).unwrap())
            });
        });
    }
    group.finish();
}

criterion_group! {
    name = benches;
    config = Criterion::default()
        .measurement_time(Duration::from_secs(10))
        .sample_size(100);
    targets = fetch_cached_benchmark, fetch_missing_benchmark, fetch_partial_benchmark
}
criterion_main!(benches);
