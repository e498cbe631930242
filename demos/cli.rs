// Copyright 2025 Google LLC
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// https://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or https://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! CLI tool to run examples of parallel async tasks.
//!
//! Run with `--features log_parallelism` and `RUST_LOG=info` to print dispatch
//! statistics.

use clap::{Parser, ValueEnum};
use paratask::time::spawn_delayed;
use paratask::{DispatcherBuilder, ItemOrder, WorkerCount};
use std::num::NonZeroUsize;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;

#[tokio::main]
async fn main() {
    env_logger::init();
    let cli = Cli::parse();

    let dispatcher = DispatcherBuilder {
        max_parallel_tasks: match cli.num_workers {
            Some(num_workers) => WorkerCount::Count(num_workers),
            None => WorkerCount::AvailableParallelism,
        },
        item_order: match cli.item_order {
            ItemOrderCli::Sequential => ItemOrder::Sequential,
            ItemOrderCli::Random => ItemOrder::Random,
            ItemOrderCli::Seeded => ItemOrder::Seeded(cli.seed),
        },
    }
    .build();

    let cancel = CancellationToken::new();
    if let Some(cancel_after_ms) = cli.cancel_after_ms {
        // Cancellation is the operation itself, so it never fails.
        drop(spawn_delayed(
            cancel_after_ms as f64 / 1000.0,
            cancel.clone(),
            {
                let cancel = cancel.clone();
                move || async move {
                    cancel.cancel();
                    Ok::<_, std::convert::Infallible>(())
                }
            },
        ));
    }

    let latency = Duration::from_millis(cli.item_latency_ms);
    let start = Instant::now();
    let num_results = match cli.scenario {
        Scenario::Squares => {
            dispatcher
                .process(0..cli.input_size, &cancel, move |x| async move {
                    tokio::time::sleep(latency).await;
                    // Squares of 64-bit inputs always fit in 128 bits.
                    Some(u128::from(x) * u128::from(x))
                })
                .await
                .len()
        }
        Scenario::Skewed => {
            // The cost of an item grows with its position, so that processing
            // items in input order leaves the slowest ones for the end.
            let input_size = cli.input_size;
            dispatcher
                .process(0..input_size, &cancel, move |x| async move {
                    tokio::time::sleep(skewed_latency(latency, x, input_size)).await;
                    Some(x)
                })
                .await
                .len()
        }
        Scenario::Filter => {
            dispatcher
                .process(0..cli.input_size, &cancel, move |x| async move {
                    tokio::time::sleep(latency).await;
                    (x % 3 == 0).then_some(x)
                })
                .await
                .len()
        }
    };
    let elapsed = start.elapsed();

    println!(
        "{} result(s) out of {} item(s) with {} worker(s) in {elapsed:?}{}",
        num_results,
        cli.input_size,
        dispatcher.num_workers(),
        if cancel.is_cancelled() {
            " (cancelled)"
        } else {
            ""
        }
    );
}

/// Latency of item `x` out of `input_size`, ranging from almost zero to twice
/// the base latency, so that the average stays close to the base latency.
fn skewed_latency(latency: Duration, x: u64, input_size: u64) -> Duration {
    let factor = 2 * u128::from(x) + 1;
    let nanos = latency.as_nanos().saturating_mul(factor) / u128::from(input_size.max(1));
    Duration::from_nanos(u64::try_from(nanos).unwrap_or(u64::MAX))
}

/// CLI tool to run examples of parallel async tasks.
#[derive(Parser, Debug, PartialEq, Eq)]
#[command(version)]
struct Cli {
    /// Number of concurrent workers. Default to the available parallelism.
    #[arg(long)]
    num_workers: Option<NonZeroUsize>,

    /// Order in which items are offered to the workers.
    #[arg(long, value_enum, default_value_t = ItemOrderCli::Random)]
    item_order: ItemOrderCli,

    /// Seed for the seeded item order.
    #[arg(long, default_value_t = 42)]
    seed: u64,

    /// Scenario to run in parallel.
    #[arg(long, value_enum)]
    scenario: Scenario,

    /// Number of items in the input.
    #[arg(long, default_value_t = 1_000)]
    input_size: u64,

    /// Simulated latency of each item, in milliseconds.
    #[arg(long, default_value_t = 1)]
    item_latency_ms: u64,

    /// Cancel the processing after this many milliseconds.
    #[arg(long)]
    cancel_after_ms: Option<u64>,
}

/// Order in which items are offered to the workers.
#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
enum ItemOrderCli {
    /// Input order.
    Sequential,
    /// Uniformly random order.
    Random,
    /// Random order reproducible from `--seed`.
    Seeded,
}

/// Scenario to run.
#[derive(ValueEnum, Clone, Debug, PartialEq, Eq)]
enum Scenario {
    /// Square each number, with a fixed latency per item.
    Squares,
    /// Items whose latency grows with their position.
    Skewed,
    /// Keep only multiples of 3, dropping the other items.
    Filter,
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_skewed_latency() {
        let latency = Duration::from_millis(10);
        assert_eq!(skewed_latency(latency, 0, 10), Duration::from_millis(1));
        assert_eq!(skewed_latency(latency, 9, 10), Duration::from_millis(19));
        assert_eq!(skewed_latency(latency, 0, 0), latency);
        // Inputs whose size doesn't fit in 32 bits.
        assert_eq!(
            skewed_latency(latency, 1 << 32, 1 << 32),
            Duration::from_millis(20)
        );
        assert_eq!(
            skewed_latency(Duration::MAX, u64::MAX, 1),
            Duration::from_nanos(u64::MAX)
        );
    }
}
