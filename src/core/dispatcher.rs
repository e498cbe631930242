// Copyright 2025 Google LLC
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// https://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or https://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! A dispatcher running an async function over many items with bounded
//! parallelism.

use super::queue::WorkQueue;
use super::worker::{Worker, WorkerOutput};
use super::{ItemOrder, WorkerCount};
use crate::macros::{log_debug, log_error, log_warn};
use std::convert::Infallible;
use std::future::Future;
use std::num::NonZeroUsize;
use std::sync::Arc;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

/// Number of workers used when nothing else is specified.
pub const DEFAULT_MAX_PARALLEL_TASKS: usize = 4;

const DEFAULT_WORKER_COUNT: NonZeroUsize = match NonZeroUsize::new(DEFAULT_MAX_PARALLEL_TASKS) {
    Some(count) => count,
    None => panic!("the default number of workers must be positive"),
};

/// A builder for [`Dispatcher`].
#[derive(Clone, Copy, Debug)]
pub struct DispatcherBuilder {
    /// Maximum number of items processed concurrently.
    pub max_parallel_tasks: WorkerCount,
    /// Order in which items are offered to the workers.
    pub item_order: ItemOrder,
}

impl Default for DispatcherBuilder {
    /// Four workers, items offered in random order.
    fn default() -> Self {
        Self {
            max_parallel_tasks: WorkerCount::Count(DEFAULT_WORKER_COUNT),
            item_order: ItemOrder::Random,
        }
    }
}

impl DispatcherBuilder {
    /// Creates a dispatcher.
    ///
    /// ```
    /// # use paratask::{DispatcherBuilder, ItemOrder, WorkerCount};
    /// # use tokio_util::sync::CancellationToken;
    /// # #[tokio::main]
    /// # async fn main() {
    /// let dispatcher = DispatcherBuilder {
    ///     max_parallel_tasks: WorkerCount::try_from(2).unwrap(),
    ///     item_order: ItemOrder::Sequential,
    /// }
    /// .build();
    ///
    /// let cancel = CancellationToken::new();
    /// let mut squares = dispatcher
    ///     .process(1..=5, &cancel, |x: u64| async move { Some(x * x) })
    ///     .await;
    /// squares.sort();
    /// assert_eq!(squares, [1, 4, 9, 16, 25]);
    /// # }
    /// ```
    pub fn build(&self) -> Dispatcher {
        Dispatcher {
            num_workers: self.max_parallel_tasks.count(),
            item_order: self.item_order,
        }
    }
}

/// Runs an async function over a collection of items, with a bounded number of
/// concurrent workers pulling from a shared queue.
///
/// Each invocation creates its own [`WorkQueue`] and spawns its own workers on
/// the ambient tokio runtime, so a single dispatcher can serve any number of
/// invocations, concurrently or not. Calling it outside of a tokio runtime
/// panics.
///
/// The output contains one entry per item whose processing yielded a result,
/// in no particular order.
#[derive(Clone, Copy, Debug)]
pub struct Dispatcher {
    /// Maximum number of workers per invocation.
    num_workers: NonZeroUsize,
    /// Order in which items are offered to the workers.
    item_order: ItemOrder,
}

impl Default for Dispatcher {
    fn default() -> Self {
        DispatcherBuilder::default().build()
    }
}

impl Dispatcher {
    /// Returns the maximum number of workers spawned per invocation.
    pub fn num_workers(&self) -> NonZeroUsize {
        self.num_workers
    }

    /// Returns the order in which items are offered to the workers.
    pub fn item_order(&self) -> ItemOrder {
        self.item_order
    }

    /// Processes all the items and collects the results.
    ///
    /// Items for which `process_item` returns [`None`] contribute nothing to
    /// the output.
    ///
    /// Cancellation via `cancel` is cooperative: each worker checks the token
    /// after claiming an item and stops if it is cancelled, returning the
    /// results accumulated so far. The item claimed at that point is dropped
    /// without being processed. A `process_item` future that is in flight
    /// when the token is cancelled is dropped at its next suspension point,
    /// and its outcome is discarded. The output therefore only contains
    /// results of items fully processed before cancellation.
    ///
    /// # Panics
    ///
    /// If any call to `process_item` panics, the other workers are asked to
    /// stop and this panics once all of them have finished.
    pub async fn process<T, R, F, Fut>(
        &self,
        items: impl IntoIterator<Item = T>,
        cancel: &CancellationToken,
        process_item: F,
    ) -> Vec<R>
    where
        T: Send + 'static,
        R: Send + 'static,
        F: Fn(T) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Option<R>> + Send + 'static,
    {
        let result = self
            .try_process(items, cancel, move |item| {
                let future = process_item(item);
                async move { Ok::<_, Infallible>(future.await) }
            })
            .await;
        match result {
            Ok(results) => results,
            Err(never) => match never {},
        }
    }

    /// Processes all the items and collects the results, stopping at the
    /// first error.
    ///
    /// This behaves like [`process()`](Self::process), except that
    /// `process_item` can fail. On the first failure, all the other workers
    /// are asked to stop (via a child token of `cancel`, so the caller's token
    /// is left untouched). Once all the workers have finished, the first error
    /// is returned and any partial results are discarded.
    ///
    /// # Panics
    ///
    /// If any call to `process_item` panics, the other workers are asked to
    /// stop and this panics once all of them have finished.
    pub async fn try_process<T, R, E, F, Fut>(
        &self,
        items: impl IntoIterator<Item = T>,
        cancel: &CancellationToken,
        process_item: F,
    ) -> Result<Vec<R>, E>
    where
        T: Send + 'static,
        R: Send + 'static,
        E: Send + 'static,
        F: Fn(T) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Option<R>, E>> + Send + 'static,
    {
        let queue = Arc::new(self.make_queue(items));
        let num_workers = self.num_workers.get().min(queue.len());
        if num_workers == 0 {
            log_debug!("[dispatcher] Nothing to process");
            return Ok(Vec::new());
        }

        let process_item = Arc::new(process_item);
        let cancel = cancel.child_token();

        let mut workers = JoinSet::new();
        for _id in 0..num_workers {
            workers.spawn(
                Worker {
                    #[cfg(feature = "log")]
                    id: _id,
                    queue: queue.clone(),
                    process_item: process_item.clone(),
                    cancel: cancel.clone(),
                }
                .run(),
            );
        }
        log_debug!(
            "[dispatcher] Spawned {num_workers} worker(s) for {} item(s)",
            queue.len()
        );

        self.join_workers(workers, &cancel).await
    }

    /// Collects all the items and arranges them in the configured order.
    fn make_queue<T>(&self, items: impl IntoIterator<Item = T>) -> WorkQueue<T> {
        let mut items = items.into_iter().collect::<Vec<T>>();
        self.item_order.arrange(&mut items);
        WorkQueue::new(items)
    }

    /// Waits for all the workers to finish and merges their outputs, in
    /// completion order.
    ///
    /// A panicking worker cancels `cancel`, which is shared by all the workers
    /// of this invocation.
    async fn join_workers<R, E>(
        &self,
        mut workers: JoinSet<WorkerOutput<R, E>>,
        cancel: &CancellationToken,
    ) -> Result<Vec<R>, E>
    where
        R: Send + 'static,
        E: Send + 'static,
    {
        let mut results = Vec::new();
        let mut first_error = None;
        let mut num_panicking_workers = 0;
        #[cfg(feature = "log_parallelism")]
        let mut stats = super::worker::DispatchStats::default();

        while let Some(joined) = workers.join_next().await {
            match joined {
                Ok(output) => {
                    #[cfg(feature = "log_parallelism")]
                    {
                        stats += &output.stats;
                    }
                    match output.results {
                        Ok(worker_results) => results.extend(worker_results),
                        Err(e) => {
                            if first_error.is_none() {
                                first_error = Some(e);
                            } else {
                                log_debug!("[dispatcher] Discarding a subsequent worker error");
                            }
                        }
                    }
                }
                Err(e) if e.is_panic() => {
                    log_error!("[dispatcher] A worker task panicked: {e}");
                    num_panicking_workers += 1;
                    cancel.cancel();
                }
                Err(_e) => {
                    log_warn!("[dispatcher] A worker task was cancelled by the runtime: {_e}");
                }
            }
        }
        log_debug!("[dispatcher] All workers have finished");

        #[cfg(feature = "log_parallelism")]
        stats.print();

        if num_panicking_workers != 0 {
            panic!("{num_panicking_workers} worker task(s) panicked!");
        }
        match first_error {
            Some(e) => Err(e),
            None => Ok(results),
        }
    }
}

/// Processes all the items with at most `max_parallel_tasks` concurrent
/// workers and collects the results.
///
/// This is a shorthand for a [`Dispatcher`] invocation with a token that is
/// never cancelled. A `max_parallel_tasks` of zero is treated as one.
///
/// ```
/// # use paratask::{process_items_in_parallel, DEFAULT_MAX_PARALLEL_TASKS};
/// # #[tokio::main]
/// # async fn main() {
/// let mut lengths = process_items_in_parallel(
///     vec!["a", "bb", "", "dddd"],
///     DEFAULT_MAX_PARALLEL_TASKS,
///     true,
///     |s: &'static str| async move { (!s.is_empty()).then_some(s.len()) },
/// )
/// .await;
/// lengths.sort();
/// assert_eq!(lengths, [1, 2, 4]);
/// # }
/// ```
pub async fn process_items_in_parallel<T, R, F, Fut>(
    items: impl IntoIterator<Item = T>,
    max_parallel_tasks: usize,
    process_in_random_order: bool,
    process_item: F,
) -> Vec<R>
where
    T: Send + 'static,
    R: Send + 'static,
    F: Fn(T) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Option<R>> + Send + 'static,
{
    process_items_in_parallel_with_token(
        items,
        max_parallel_tasks,
        process_in_random_order,
        &CancellationToken::new(),
        process_item,
    )
    .await
}

/// Processes all the items with at most `max_parallel_tasks` concurrent
/// workers and collects the results, stopping early if `cancel` is cancelled.
///
/// See [`Dispatcher::process()`] for the cancellation semantics. A
/// `max_parallel_tasks` of zero is treated as one.
pub async fn process_items_in_parallel_with_token<T, R, F, Fut>(
    items: impl IntoIterator<Item = T>,
    max_parallel_tasks: usize,
    process_in_random_order: bool,
    cancel: &CancellationToken,
    process_item: F,
) -> Vec<R>
where
    T: Send + 'static,
    R: Send + 'static,
    F: Fn(T) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Option<R>> + Send + 'static,
{
    let max_parallel_tasks = WorkerCount::try_from(max_parallel_tasks).unwrap_or_else(|_| {
        log_warn!("A parallelism of 0 was requested, using 1 worker instead");
        WorkerCount::Count(NonZeroUsize::MIN)
    });
    DispatcherBuilder {
        max_parallel_tasks,
        item_order: ItemOrder::from(process_in_random_order),
    }
    .build()
    .process(items, cancel, process_item)
    .await
}
