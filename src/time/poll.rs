// Copyright 2025 Google LLC
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// https://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or https://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

use super::delay::seconds_to_duration;
use crate::macros::log_debug;
use std::future::Future;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// Repeatedly evaluates an async predicate until it holds.
///
/// The predicate is evaluated once right away, then again every
/// `interval_secs` seconds. This returns:
/// - `true` as soon as the predicate returns `true`,
/// - `false` once `timeout_secs` seconds have elapsed without success,
/// - `false` as soon as `cancel` is cancelled, including while sleeping
///   between two attempts.
///
/// Sleeping never blocks the underlying thread. An in-flight evaluation of
/// the predicate is not interrupted by the timeout nor by cancellation.
///
/// ```
/// # use paratask::time::poll_until;
/// # use std::sync::atomic::{AtomicU32, Ordering};
/// # use tokio_util::sync::CancellationToken;
/// # #[tokio::main]
/// # async fn main() {
/// let attempts = AtomicU32::new(0);
/// let ready = poll_until(1.0, 0.01, &CancellationToken::new(), || async {
///     attempts.fetch_add(1, Ordering::Relaxed) >= 2
/// })
/// .await;
/// assert!(ready);
/// assert_eq!(attempts.load(Ordering::Relaxed), 3);
/// # }
/// ```
pub async fn poll_until<F, Fut>(
    timeout_secs: f64,
    interval_secs: f64,
    cancel: &CancellationToken,
    mut predicate: F,
) -> bool
where
    F: FnMut() -> Fut,
    Fut: Future<Output = bool>,
{
    // A timeout too large to be represented never expires.
    let deadline = Instant::now().checked_add(seconds_to_duration(timeout_secs));
    let interval = seconds_to_duration(interval_secs);

    loop {
        if cancel.is_cancelled() {
            log_debug!("Polling cancelled");
            return false;
        }
        if predicate().await {
            return true;
        }
        if deadline.is_some_and(|deadline| Instant::now() >= deadline) {
            log_debug!("Polling timed out after {timeout_secs}s");
            return false;
        }

        if cancel
            .run_until_cancelled(tokio::time::sleep(interval))
            .await
            .is_none()
        {
            log_debug!("Polling cancelled while waiting for the next attempt");
            return false;
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Duration;

    #[tokio::test(start_paused = true)]
    async fn test_succeeds_on_first_attempt() {
        let start = Instant::now();
        let ready = poll_until(10.0, 1.0, &CancellationToken::new(), || async { true }).await;
        assert!(ready);
        assert_eq!(start.elapsed(), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn test_succeeds_after_some_attempts() {
        let attempts = AtomicU32::new(0);
        let start = Instant::now();
        let ready = poll_until(10.0, 1.0, &CancellationToken::new(), || async {
            attempts.fetch_add(1, Ordering::SeqCst) == 2
        })
        .await;
        assert!(ready);
        assert_eq!(attempts.load(Ordering::SeqCst), 3);
        let elapsed = start.elapsed();
        assert!(elapsed >= Duration::from_secs(2));
        assert!(elapsed < Duration::from_secs(3));
    }

    #[tokio::test(start_paused = true)]
    async fn test_times_out() {
        let attempts = AtomicU32::new(0);
        let start = Instant::now();
        let ready = poll_until(5.0, 1.0, &CancellationToken::new(), || async {
            attempts.fetch_add(1, Ordering::SeqCst);
            false
        })
        .await;
        assert!(!ready);
        assert!(start.elapsed() >= Duration::from_secs(5));
        // Attempts at t = 0, 1, 2, 3, 4 and 5 seconds.
        assert_eq!(attempts.load(Ordering::SeqCst), 6);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancelled_while_sleeping() {
        let cancel = CancellationToken::new();
        tokio::spawn({
            let cancel = cancel.clone();
            async move {
                tokio::time::sleep(Duration::from_millis(2500)).await;
                cancel.cancel();
            }
        });

        let start = Instant::now();
        let ready = poll_until(60.0, 1.0, &cancel, || async { false }).await;
        assert!(!ready);
        let elapsed = start.elapsed();
        assert!(elapsed >= Duration::from_millis(2500));
        assert!(elapsed < Duration::from_secs(3));
    }

    #[tokio::test(start_paused = true)]
    async fn test_already_cancelled() {
        let cancel = CancellationToken::new();
        cancel.cancel();
        let attempts = AtomicU32::new(0);
        let ready = poll_until(60.0, 1.0, &cancel, || async {
            attempts.fetch_add(1, Ordering::SeqCst);
            true
        })
        .await;
        assert!(!ready);
        assert_eq!(attempts.load(Ordering::SeqCst), 0);
    }
}
