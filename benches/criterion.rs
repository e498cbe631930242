// Copyright 2025 Google LLC
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// https://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or https://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

use ::paratask::ItemOrder;
use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use tokio::runtime::Runtime;

const NUM_WORKERS: &[usize] = &[1, 2, 4, 8];
const LENGTHS: &[usize] = &[1_000, 10_000, 100_000];

fn runtime() -> Runtime {
    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .unwrap()
}

/// Items that complete immediately, to measure the dispatch overhead.
fn ready(c: &mut Criterion) {
    let runtime = runtime();
    let mut group = c.benchmark_group("ready");
    for len in LENGTHS {
        group.throughput(Throughput::Elements(*len as u64));
        for &num_workers in NUM_WORKERS {
            group.bench_with_input(
                BenchmarkId::new(format!("buffer_unordered@{num_workers}"), len),
                len,
                |bencher, len| futures::ready(bencher, &runtime, num_workers, len),
            );
            for (item_order, order_name) in [
                (ItemOrder::Sequential, "sequential"),
                (ItemOrder::Random, "random"),
            ] {
                group.bench_with_input(
                    BenchmarkId::new(format!("paratask_{order_name}@{num_workers}"), len),
                    len,
                    |bencher, len| paratask::ready(bencher, &runtime, item_order, num_workers, len),
                );
            }
        }
    }
    group.finish();
}

/// Items that yield to the scheduler once, as a stand-in for real I/O.
fn yielding(c: &mut Criterion) {
    let runtime = runtime();
    let mut group = c.benchmark_group("yielding");
    for len in LENGTHS {
        group.throughput(Throughput::Elements(*len as u64));
        for &num_workers in NUM_WORKERS {
            group.bench_with_input(
                BenchmarkId::new(format!("buffer_unordered@{num_workers}"), len),
                len,
                |bencher, len| futures::yielding(bencher, &runtime, num_workers, len),
            );
            group.bench_with_input(
                BenchmarkId::new(format!("paratask@{num_workers}"), len),
                len,
                |bencher, len| {
                    paratask::yielding(bencher, &runtime, ItemOrder::Random, num_workers, len)
                },
            );
        }
    }
    group.finish();
}

/// Baseline benchmarks using the `futures` stream combinators, polled on a
/// single task.
mod futures {
    use criterion::{black_box, Bencher};
    use futures::stream::{self, StreamExt};
    use tokio::runtime::Runtime;

    pub fn ready(bencher: &mut Bencher, runtime: &Runtime, num_workers: usize, len: &usize) {
        let len = *len as u64;
        bencher.to_async(runtime).iter(|| async move {
            stream::iter(0..black_box(len))
                .map(|x| async move { x * 2 })
                .buffer_unordered(num_workers)
                .collect::<Vec<u64>>()
                .await
        });
    }

    pub fn yielding(bencher: &mut Bencher, runtime: &Runtime, num_workers: usize, len: &usize) {
        let len = *len as u64;
        bencher.to_async(runtime).iter(|| async move {
            stream::iter(0..black_box(len))
                .map(|x| async move {
                    tokio::task::yield_now().await;
                    x * 2
                })
                .buffer_unordered(num_workers)
                .collect::<Vec<u64>>()
                .await
        });
    }
}

/// Benchmarks using Paratask.
mod paratask {
    use criterion::{black_box, Bencher};
    use paratask::{DispatcherBuilder, ItemOrder, WorkerCount};
    use tokio::runtime::Runtime;
    use tokio_util::sync::CancellationToken;

    pub fn ready(
        bencher: &mut Bencher,
        runtime: &Runtime,
        item_order: ItemOrder,
        num_workers: usize,
        len: &usize,
    ) {
        let len = *len as u64;
        let dispatcher = DispatcherBuilder {
            max_parallel_tasks: WorkerCount::try_from(num_workers).unwrap(),
            item_order,
        }
        .build();
        let cancel = CancellationToken::new();

        bencher.to_async(runtime).iter(|| {
            dispatcher.process(0..black_box(len), &cancel, |x| async move { Some(x * 2) })
        });
    }

    pub fn yielding(
        bencher: &mut Bencher,
        runtime: &Runtime,
        item_order: ItemOrder,
        num_workers: usize,
        len: &usize,
    ) {
        let len = *len as u64;
        let dispatcher = DispatcherBuilder {
            max_parallel_tasks: WorkerCount::try_from(num_workers).unwrap(),
            item_order,
        }
        .build();
        let cancel = CancellationToken::new();

        bencher.to_async(runtime).iter(|| {
            dispatcher.process(0..black_box(len), &cancel, |x| async move {
                tokio::task::yield_now().await;
                Some(x * 2)
            })
        });
    }
}

criterion_group!(benches, ready, yielding);
criterion_main!(benches);
