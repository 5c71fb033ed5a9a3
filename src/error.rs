// Copyright 2022 houseme
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

use std::error::Error as StdError;
use thiserror::Error;

/// Convenience type alias for caller-supplied node id providers.
pub type BoxDynError = Box<dyn StdError + 'static + Send + Sync>;

/// The error type for this crate.
#[derive(Error, Debug)]
pub enum Error {
    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),
    #[error("node_id provider returned an error: {0}")]
    NodeIdFailed(#[source] BoxDynError),
    #[error("check_node_id returned false for node id {0}")]
    CheckNodeIdFailed(u16),
    /// The clock reads earlier than the last issued timestamp (or earlier than
    /// the custom epoch). Retrying observes the same clock, so treat this as a
    /// health fault of the process rather than a per-request failure.
    #[error(
        "clock moved backwards: last timestamp {last_timestamp}ms, current timestamp {current_timestamp}ms"
    )]
    ClockMovedBackwards {
        last_timestamp: i64,
        current_timestamp: i64,
    },
    #[error("timestamp {0}ms no longer fits in the 41-bit field of the identifier")]
    EpochExhausted(i64),
    #[error("mutex is poisoned (i.e. a panic happened while it was locked)")]
    MutexPoisoned,
}
