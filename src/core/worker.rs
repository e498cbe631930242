// Copyright 2025 Google LLC
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// https://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or https://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Worker loop pulling items from a shared queue.

use super::queue::WorkQueue;
use crate::macros::log_debug;
#[cfg(feature = "log_parallelism")]
use crate::macros::{log_info, log_trace};
use std::future::Future;
#[cfg(feature = "log_parallelism")]
use std::ops::AddAssign;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Context object owned by a worker task.
pub struct Worker<T, F> {
    /// Worker index.
    #[cfg(feature = "log")]
    pub id: usize,
    /// Queue shared with all the other workers of the same dispatch.
    pub queue: Arc<WorkQueue<T>>,
    /// Function to run on each item.
    pub process_item: Arc<F>,
    /// Token shared with all the other workers of the same dispatch.
    pub cancel: CancellationToken,
}

/// What a worker hands back to the dispatcher once its loop exits.
pub struct WorkerOutput<R, E> {
    /// Results accumulated by this worker, or the error that stopped it.
    pub results: Result<Vec<R>, E>,
    /// Local dispatch statistics.
    #[cfg(feature = "log_parallelism")]
    pub stats: DispatchStats,
}

impl<T, F> Worker<T, F> {
    /// Main function run by this worker.
    ///
    /// Items are claimed and processed one at a time until the queue is
    /// exhausted, cancellation is observed or processing fails. An item
    /// claimed after cancellation is dropped without being processed; it is
    /// never handed back to the queue.
    ///
    /// Cancellation also reaches the item being processed: its future is
    /// dropped at its next suspension point, and a result that completes
    /// after cancellation is discarded. Only items fully processed before
    /// cancellation contribute to the output.
    ///
    /// On failure, the shared token is cancelled so that the other workers
    /// stop at their next iteration.
    pub async fn run<R, E, Fut>(self) -> WorkerOutput<R, E>
    where
        F: Fn(T) -> Fut,
        Fut: Future<Output = Result<Option<R>, E>>,
    {
        let mut results = Vec::new();
        #[cfg(feature = "log_parallelism")]
        let mut stats = DispatchStats::default();

        let outcome = loop {
            let Some(item) = self.queue.take() else {
                log_debug!("[worker {}] Queue exhausted", self.id);
                break Ok(());
            };
            if self.cancel.is_cancelled() {
                log_debug!(
                    "[worker {}] Cancellation observed, dropping the claimed item",
                    self.id
                );
                #[cfg(feature = "log_parallelism")]
                {
                    stats.dropped += 1;
                }
                drop(item);
                break Ok(());
            }

            let Some(processed) = self
                .cancel
                .run_until_cancelled((self.process_item)(item))
                .await
            else {
                log_debug!(
                    "[worker {}] Cancellation observed, dropping the in-flight item",
                    self.id
                );
                #[cfg(feature = "log_parallelism")]
                {
                    stats.dropped += 1;
                }
                break Ok(());
            };
            // The future may complete in the same poll that observes cancellation.
            if self.cancel.is_cancelled() {
                log_debug!(
                    "[worker {}] Cancellation observed, discarding the last outcome",
                    self.id
                );
                #[cfg(feature = "log_parallelism")]
                {
                    stats.dropped += 1;
                }
                break Ok(());
            }

            match processed {
                Ok(Some(result)) => {
                    #[cfg(feature = "log_parallelism")]
                    {
                        log_trace!("[worker {}] Processed an item", self.id);
                        stats.processed += 1;
                    }
                    results.push(result);
                }
                Ok(None) => {
                    #[cfg(feature = "log_parallelism")]
                    {
                        log_trace!("[worker {}] Processed an item without result", self.id);
                        stats.no_result += 1;
                    }
                }
                Err(e) => {
                    log_debug!(
                        "[worker {}] Processing failed, cancelling the other workers",
                        self.id
                    );
                    #[cfg(feature = "log_parallelism")]
                    {
                        stats.failed += 1;
                    }
                    self.cancel.cancel();
                    break Err(e);
                }
            }
        };

        WorkerOutput {
            results: outcome.map(|()| results),
            #[cfg(feature = "log_parallelism")]
            stats,
        }
    }
}

/// Counters of what happened to the items claimed by the workers.
#[cfg(feature = "log_parallelism")]
#[derive(Default)]
pub struct DispatchStats {
    /// Number of items processed into a result.
    processed: u64,
    /// Number of items processed without yielding a result.
    no_result: u64,
    /// Number of items claimed or in flight when cancellation was observed,
    /// whose outcome was dropped.
    dropped: u64,
    /// Number of items whose processing failed.
    failed: u64,
}

#[cfg(feature = "log_parallelism")]
impl DispatchStats {
    /// Logs these statistics.
    pub fn print(&self) {
        log_info!("Dispatch statistics:");
        log_info!("- processed: {}", self.processed);
        log_info!("- no_result: {}", self.no_result);
        log_info!("- dropped: {}", self.dropped);
        log_info!("- failed: {}", self.failed);
        log_info!(
            "- claimed: {}",
            self.processed + self.no_result + self.dropped + self.failed
        );
    }
}

#[cfg(feature = "log_parallelism")]
impl AddAssign<&DispatchStats> for DispatchStats {
    fn add_assign(&mut self, other: &DispatchStats) {
        self.processed += other.processed;
        self.no_result += other.no_result;
        self.dropped += other.dropped;
        self.failed += other.failed;
    }
}
