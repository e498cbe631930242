// Copyright 2025 Google LLC
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// https://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or https://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Simple program that squares a few numbers with 2 workers, in input order.

use paratask::process_items_in_parallel;

#[tokio::main]
async fn main() {
    env_logger::init();

    let mut squares =
        process_items_in_parallel(vec![1u64, 2, 3, 4, 5], 2, false, |x| async move {
            Some(x * x)
        })
        .await;
    squares.sort_unstable();
    println!("squares = {squares:?}");
}
