//! Performance benchmarks for redis-config-store.
//!
//! Measures the in-process paths: snapshot reads on a refreshing configuration,
//! refresh cost, and the self-notification filter on received messages. All
//! benchmarks run against the in-process backend.

use async_trait::async_trait;
use criterion::{BenchmarkId, Criterion, Throughput, black_box, criterion_group, criterion_main};
use redis_config_store::backend::MemoryConnection;
use redis_config_store::prelude::*;
use std::sync::{Arc, Barrier};
use std::thread;
use std::time::Duration;

type MemoryConfig = RefreshingConfig<HashConfigStore<MemoryConnection>>;

fn populated_config(runtime: &tokio::runtime::Runtime, entries: usize) -> MemoryConfig {
    let store = HashConfigStore::new(MemoryConnection::new(), "bench").unwrap();
    let config = RefreshingConfig::new(store);
    runtime.block_on(async {
        for i in 0..entries {
            config.store().set(&format!("key_{}", i), i).await.unwrap();
        }
        config.refresh().await.unwrap();
    });
    config
}

struct NoopSubscriber;

#[async_trait]
impl RefreshSubscriber for NoopSubscriber {
    async fn refresh(&self) -> Result<()> {
        Ok(())
    }
}

/// Benchmark single-threaded read latency
fn benchmark_read_latency(c: &mut Criterion) {
    let runtime = tokio::runtime::Runtime::new().unwrap();
    let config = populated_config(&runtime, 64);

    let mut group = c.benchmark_group("read_latency");
    group.bench_function("get", |b| {
        b.iter(|| {
            black_box(config.get("key_7"));
        });
    });
    group.bench_function("snapshot", |b| {
        b.iter(|| {
            let snapshot = config.snapshot();
            black_box(snapshot.len());
        });
    });
    group.finish();
}

/// Benchmark concurrent reads with varying thread counts
fn benchmark_concurrent_reads(c: &mut Criterion) {
    let runtime = tokio::runtime::Runtime::new().unwrap();
    let mut group = c.benchmark_group("concurrent_reads");

    for num_threads in [1, 2, 4, 8] {
        group.throughput(Throughput::Elements(num_threads as u64 * 1000));

        group.bench_with_input(
            BenchmarkId::from_parameter(format!("{}_threads", num_threads)),
            &num_threads,
            |b, &num_threads| {
                let config = populated_config(&runtime, 64);
                let barrier = Arc::new(Barrier::new(num_threads + 1));

                b.iter_custom(|iters| {
                    let mut handles = vec![];

                    for _ in 0..num_threads {
                        let cfg = config.clone();
                        let barrier = Arc::clone(&barrier);

                        handles.push(thread::spawn(move || {
                            barrier.wait();

                            let start = std::time::Instant::now();
                            for _ in 0..iters {
                                black_box(cfg.get("key_7"));
                            }
                            start.elapsed()
                        }));
                    }

                    barrier.wait();

                    let total: Duration = handles.into_iter().map(|h| h.join().unwrap()).sum();
                    total / num_threads as u32
                });
            },
        );
    }

    group.finish();
}

/// Benchmark a full reload from the store
fn benchmark_refresh(c: &mut Criterion) {
    let runtime = tokio::runtime::Runtime::new().unwrap();

    let mut group = c.benchmark_group("refresh");
    for entries in [8, 64, 512] {
        let config = populated_config(&runtime, entries);
        group.bench_with_input(BenchmarkId::from_parameter(entries), &entries, |b, _| {
            b.iter(|| {
                runtime.block_on(async {
                    config.refresh().await.unwrap();
                });
            });
        });
    }
    group.finish();
}

/// Benchmark the receive path for own and foreign announcements
fn benchmark_message_filter(c: &mut Criterion) {
    let runtime = tokio::runtime::Runtime::new().unwrap();
    let publisher = runtime
        .block_on(async { PubSubChangePublisher::new(MemoryConnection::new(), "bench") })
        .unwrap();
    publisher.subscribe(Arc::new(NoopSubscriber)).unwrap();
    let own_id = publisher.publisher_id().to_string();

    let mut group = c.benchmark_group("message_filter");
    group.bench_function("own_identity", |b| {
        b.iter(|| runtime.block_on(publisher.handle_message(Some(black_box(own_id.as_str())))));
    });
    group.bench_function("foreign_identity", |b| {
        b.iter(|| runtime.block_on(publisher.handle_message(Some(black_box("someone-else")))));
    });
    group.finish();
}

criterion_group!(
    benches,
    benchmark_read_latency,
    benchmark_concurrent_reads,
    benchmark_refresh,
    benchmark_message_filter,
);

criterion_main!(benches);
