// Copyright 2025 Google LLC
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// https://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or https://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! A queue handing out pre-filled items to concurrent workers.

use crossbeam_utils::atomic::AtomicCell;
use crossbeam_utils::CachePadded;
use std::sync::atomic::{AtomicUsize, Ordering};

/// A fixed sequence of items, dispensed one at a time to any number of
/// concurrent callers.
///
/// The queue is filled once at construction and only ever shrinks: each call
/// to [`take()`](Self::take) claims the next unclaimed position by advancing a
/// single shared cursor. Positions are claimed in order, so callers observe a
/// total order of dispense events and no two callers ever obtain the same
/// item.
///
/// Once every item has been dispensed the queue is exhausted, and
/// [`take()`](Self::take) returns [`None`] forever.
///
/// ```
/// # use paratask::WorkQueue;
/// let queue = WorkQueue::new(["a", "b", "c"]);
/// assert_eq!(queue.take(), Some("a"));
/// assert_eq!(queue.take(), Some("b"));
/// assert_eq!(queue.take(), Some("c"));
/// assert_eq!(queue.take(), None);
/// assert_eq!(queue.take(), None);
/// ```
pub struct WorkQueue<T> {
    /// Slots holding the items that haven't been dispensed yet.
    slots: Box<[AtomicCell<Option<T>>]>,
    /// Index of the next slot to dispense. Never exceeds `slots.len()`.
    cursor: CachePadded<AtomicUsize>,
}

impl<T> WorkQueue<T> {
    /// Creates a queue that dispenses the given items in iteration order.
    pub fn new(items: impl IntoIterator<Item = T>) -> Self {
        Self {
            slots: items
                .into_iter()
                .map(|item| AtomicCell::new(Some(item)))
                .collect(),
            cursor: CachePadded::new(AtomicUsize::new(0)),
        }
    }

    /// Claims the next unclaimed item, or returns [`None`] if the queue is
    /// exhausted.
    ///
    /// This never blocks and never fails. It is safe to call concurrently
    /// from any number of threads or tasks.
    pub fn take(&self) -> Option<T> {
        let len = self.slots.len();
        // The cursor is bounded by the number of items, so it can't overflow
        // however many times an exhausted queue is polled.
        let index = self
            .cursor
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |cursor| {
                (cursor < len).then_some(cursor + 1)
            })
            .ok()?;
        // Each index is returned by the `fetch_update()` above exactly once, so
        // this slot can't have been emptied by another caller.
        self.slots[index].take()
    }

    /// Returns the total number of items this queue was created with.
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// Returns true if this queue was created without any items.
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Returns the number of items dispensed so far.
    pub fn dispensed(&self) -> usize {
        self.cursor.load(Ordering::Acquire)
    }

    /// Returns the number of items not yet dispensed.
    pub fn remaining(&self) -> usize {
        self.len() - self.dispensed()
    }

    /// Returns true once every item has been dispensed.
    pub fn is_exhausted(&self) -> bool {
        self.remaining() == 0
    }
}

impl<T> std::fmt::Debug for WorkQueue<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkQueue")
            .field("len", &self.len())
            .field("dispensed", &self.dispensed())
            .finish()
    }
}
