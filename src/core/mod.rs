// Copyright 2025 Google LLC
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// https://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or https://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Core engine: work queue, dispatcher and worker loop.

mod dispatcher;
mod queue;
mod worker;

use crate::macros::log_warn;
pub use dispatcher::{
    process_items_in_parallel, process_items_in_parallel_with_token, Dispatcher,
    DispatcherBuilder, DEFAULT_MAX_PARALLEL_TASKS,
};
pub use queue::WorkQueue;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha12Rng;
use std::num::NonZeroUsize;

/// Number of workers a dispatcher runs concurrently.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WorkerCount {
    /// Run as many workers as returned by
    /// [`std::thread::available_parallelism()`].
    AvailableParallelism,
    /// Run the given number of workers.
    Count(NonZeroUsize),
}

impl WorkerCount {
    /// Resolves the number of workers to run.
    pub fn count(self) -> NonZeroUsize {
        match self {
            WorkerCount::AvailableParallelism => {
                std::thread::available_parallelism().unwrap_or_else(|_e| {
                    log_warn!("Getting the available parallelism failed, using 1 worker: {_e}");
                    NonZeroUsize::MIN
                })
            }
            WorkerCount::Count(count) => count,
        }
    }
}

impl TryFrom<usize> for WorkerCount {
    type Error = <NonZeroUsize as TryFrom<usize>>::Error;

    fn try_from(worker_count: usize) -> Result<Self, Self::Error> {
        let count = NonZeroUsize::try_from(worker_count)?;
        Ok(WorkerCount::Count(count))
    }
}

/// Order in which the items of an input are offered to the workers.
///
/// This only affects which worker picks up which item, never which items get
/// processed. Shuffling helps when the cost of an item correlates with its
/// position, to avoid all the slow items landing on the same worker.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ItemOrder {
    /// Items are offered in input order.
    Sequential,
    /// Items are offered in a uniformly random order.
    Random,
    /// Items are offered in a random order that is reproducible from the
    /// given seed.
    Seeded(u64),
}

impl ItemOrder {
    /// Rearranges the given items according to this order.
    pub fn arrange<T>(self, items: &mut [T]) {
        match self {
            ItemOrder::Sequential => (),
            ItemOrder::Random => items.shuffle(&mut rand::rng()),
            ItemOrder::Seeded(seed) => items.shuffle(&mut ChaCha12Rng::seed_from_u64(seed)),
        }
    }
}

impl From<bool> for ItemOrder {
    /// Maps a "process in random order" flag to an order.
    fn from(random: bool) -> Self {
        if random {
            ItemOrder::Random
        } else {
            ItemOrder::Sequential
        }
    }
}
