// Copyright 2025 Google LLC
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// https://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or https://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

use crate::macros::log_debug;
use std::future::Future;
use std::time::Duration;
use thiserror::Error;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Error returned by a delayed operation.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum DelayError<E> {
    /// The delay was cancelled, so the operation never ran.
    #[error("the delayed operation was cancelled before it started")]
    Cancelled,
    /// The operation ran and failed.
    #[error(transparent)]
    Operation(E),
}

/// Converts a number of seconds into a [`Duration`], rounding up to the next
/// nanosecond.
///
/// Zero, negative and NaN inputs yield [`Duration::ZERO`]. Inputs too large to
/// be represented saturate to [`Duration::MAX`].
///
/// ```
/// # use paratask::time::seconds_to_duration;
/// # use std::time::Duration;
/// assert_eq!(seconds_to_duration(1.5), Duration::from_millis(1500));
/// assert_eq!(seconds_to_duration(1e-10), Duration::from_nanos(1));
/// assert_eq!(seconds_to_duration(-3.0), Duration::ZERO);
/// ```
pub fn seconds_to_duration(seconds: f64) -> Duration {
    if seconds.is_nan() || seconds <= 0.0 {
        return Duration::ZERO;
    }
    let nanos = (seconds * 1e9).ceil();
    if nanos >= u64::MAX as f64 {
        Duration::MAX
    } else {
        Duration::from_nanos(nanos as u64)
    }
}

/// Waits for the given number of seconds, then runs the operation and returns
/// its result.
///
/// If `cancel` is cancelled before the delay elapses, this returns
/// [`DelayError::Cancelled`] right away and the operation never runs. Once
/// started, the operation isn't interrupted by cancellation.
pub async fn delay_then<T, E, F, Fut>(
    seconds: f64,
    cancel: &CancellationToken,
    operation: F,
) -> Result<T, DelayError<E>>
where
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    let delay = seconds_to_duration(seconds);
    // Cancellation takes precedence over a delay elapsing in the same poll.
    let slept = cancel.run_until_cancelled(tokio::time::sleep(delay)).await;
    if slept.is_none() || cancel.is_cancelled() {
        log_debug!("Delay of {delay:?} cancelled, skipping the operation");
        return Err(DelayError::Cancelled);
    }
    operation().await.map_err(DelayError::Operation)
}

/// Spawns a task on the current tokio runtime that waits for the given number
/// of seconds and then runs the operation.
///
/// See [`delay_then()`] for the cancellation semantics. Aborting the returned
/// handle also prevents the operation from running if it hasn't started yet.
///
/// # Panics
///
/// Panics if called outside of a tokio runtime.
pub fn spawn_delayed<T, E, F, Fut>(
    seconds: f64,
    cancel: CancellationToken,
    operation: F,
) -> JoinHandle<Result<T, DelayError<E>>>
where
    T: Send + 'static,
    E: Send + 'static,
    F: FnOnce() -> Fut + Send + 'static,
    Fut: Future<Output = Result<T, E>> + Send + 'static,
{
    tokio::spawn(async move { delay_then(seconds, &cancel, operation).await })
}
