//! Performance benchmarks for atomic-fairness
//!
//! Run with: cargo bench
//!
//! These benchmarks measure:
//! - Statistics accumulation and percentile lookup
//! - Slot report/read-and-reset cost
//! - Contended increments on a shared arena row versus spaced buckets

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use std::sync::atomic::Ordering;
use std::sync::Arc;

use atomic_fairness::arena::{bucket_for, ContentionArena, WorkerSlot};
use atomic_fairness::stats::StatAccumulator;

/// Benchmark the streaming accumulator with varying sample counts
fn bench_accumulator(c: &mut Criterion) {
    let mut group = c.benchmark_group("accumulator");

    for size in [100, 1000, 10000].iter() {
        group.throughput(Throughput::Elements(*size as u64));

        group.bench_with_input(BenchmarkId::new("add", size), size, |b, &size| {
            b.iter(|| {
                let mut acc = StatAccumulator::new();
                for i in 0..size {
                    // spread samples over a few decades of the log scale
                    acc.add(10.0 + (i % 997) as f64 * 7.3);
                }
                acc.finalize();
                black_box(acc);
            });
        });

        group.bench_with_input(BenchmarkId::new("percentile", size), size, |b, &size| {
            let mut acc = StatAccumulator::new();
            for i in 0..size {
                acc.add(10.0 + (i % 997) as f64 * 7.3);
            }
            acc.finalize();

            b.iter(|| {
                black_box(acc.percentile(black_box(0.99)));
            });
        });
    }

    group.finish();
}

/// Benchmark the slot protocol between a worker and the orchestrator
fn bench_slot(c: &mut Criterion) {
    let mut group = c.benchmark_group("worker_slot");

    group.bench_function("report", |b| {
        let slot = WorkerSlot::new(0, 0);
        b.iter(|| slot.report(black_box(50)));
    });

    group.bench_function("take", |b| {
        let slot = WorkerSlot::new(0, 0);
        b.iter(|| {
            slot.report(50);
            black_box(slot.take());
        });
    });

    group.finish();
}

/// Benchmark contended increments: every thread on one counter (spacer 0)
/// against each thread on its own cache line
fn bench_contention(c: &mut Criterion) {
    let mut group = c.benchmark_group("contention");
    const INCREMENTS: u64 = 10_000;

    for num_threads in [2, 4, 8].iter() {
        let thread_count = *num_threads;
        group.throughput(Throughput::Elements(INCREMENTS * thread_count as u64));

        for (name, spacer) in [("shared_counter", 0.0), ("spaced_counters", 16.0)] {
            group.bench_with_input(
                BenchmarkId::new(name, thread_count),
                &thread_count,
                |b, &threads| {
                    let arena = Arc::new(ContentionArena::new());

                    b.iter(|| {
                        let handles: Vec<_> = (0..threads)
                            .map(|u| {
                                let arena = Arc::clone(&arena);
                                let bucket = bucket_for(u, spacer);
                                std::thread::spawn(move || {
                                    let counter = arena.counter(0, bucket);
                                    for _ in 0..INCREMENTS {
                                        counter.fetch_add(1, Ordering::Relaxed);
                                    }
                                })
                            })
                            .collect();

                        for handle in handles {
                            let _: () = handle.join().unwrap();
                        }
                    });

                    black_box(arena.load(0, 0));
                },
            );
        }
    }

    group.finish();
}

criterion_group!(benches, bench_accumulator, bench_slot, bench_contention);
criterion_main!(benches);
