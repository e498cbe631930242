// Copyright 2025 Google LLC
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// https://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or https://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

#![doc = include_str!("../README.md")]
#![forbid(missing_docs, unsafe_code)]

mod core;
mod macros;
pub mod time;

pub use crate::core::{
    process_items_in_parallel, process_items_in_parallel_with_token, Dispatcher,
    DispatcherBuilder, ItemOrder, WorkQueue, WorkerCount, DEFAULT_MAX_PARALLEL_TASKS,
};
