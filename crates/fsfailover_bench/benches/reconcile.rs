//! Reconciliation benchmarks.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use fsfailover_bench::{file_path, memory_group, payload, snapshot, GROUP_NAME};
use fsfailover_core::{ExtraFilesPolicy, QueueBus, Reconciler};
use std::sync::Arc;

/// Benchmark the inventory diff of the primary against three secondaries.
fn bench_inventory_diff(c: &mut Criterion) {
    let mut group = c.benchmark_group("inventory_diff");

    for files in [100, 1_000, 10_000].iter() {
        group.throughput(Throughput::Elements(*files as u64));
        group.bench_with_input(BenchmarkId::from_parameter(files), files, |b, &files| {
            let snapshot = snapshot(4, files, 10);
            b.iter(|| {
                let pairs = snapshot.diff(black_box(0));
                black_box(pairs);
            });
        });
    }

    group.finish();
}

/// Benchmark a full reconciliation run over in-memory backends.
fn bench_sync(c: &mut Criterion) {
    let mut group = c.benchmark_group("sync");
    group.sample_size(20);

    for files in [100, 1_000].iter() {
        group.throughput(Throughput::Elements(*files as u64));
        group.bench_with_input(BenchmarkId::from_parameter(files), files, |b, &files| {
            let (registry, memories) = memory_group(3);
            let data = payload(32);
            for i in 0..files {
                memories[0]
                    .write_with_timestamp(&file_path(i), &data, 1_000)
                    .unwrap();
                if i % 2 == 0 {
                    memories[1]
                        .write_with_timestamp(&file_path(i), &data, 1_000)
                        .unwrap();
                }
            }

            let queue = Arc::new(QueueBus::new());
            let reconciler = Reconciler::new(registry, Arc::clone(&queue) as _);
            b.iter(|| {
                let summary = reconciler
                    .sync(GROUP_NAME, black_box(ExtraFilesPolicy::Copy))
                    .unwrap();
                queue.clear();
                black_box(summary);
            });
        });
    }

    group.finish();
}

criterion_group!(benches, bench_inventory_diff, bench_sync);
criterion_main!(benches);
