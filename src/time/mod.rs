// Copyright 2025 Google LLC
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// https://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or https://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Cancellable scheduling helpers: delayed operations and polling loops.
//!
//! Durations are given in seconds as `f64`, and converted by
//! [`seconds_to_duration()`] which never rounds down.

mod delay;
mod poll;

pub use delay::{delay_then, seconds_to_duration, spawn_delayed, DelayError};
pub use poll::poll_until;
