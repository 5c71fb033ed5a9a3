// Copyright 2022 houseme
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

use chrono::Utc;
use std::sync::Arc;

/// A source of wall-clock time in milliseconds since the Unix epoch.
///
/// [`SystemClock`] is used unless a builder is given another one, which is
/// how tests drive the allocator with a fake clock:
///
/// ```
/// use flake_alloc::{ClockSource, IdAllocator};
///
/// struct Frozen;
/// impl ClockSource for Frozen {
///     fn now_millis(&self) -> i64 {
///         1_700_000_000_000
///     }
/// }
///
/// let alloc = IdAllocator::builder().node_id(7).clock(Frozen).finalize().unwrap();
/// assert!(alloc.next_id().is_ok());
/// ```
pub trait ClockSource: Send + Sync {
    /// Returns the current time in milliseconds since 1970-01-01T00:00:00Z.
    fn now_millis(&self) -> i64;
}

/// The system wall clock.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl ClockSource for SystemClock {
    fn now_millis(&self) -> i64 {
        Utc::now().timestamp_millis()
    }
}

impl<C: ClockSource + ?Sized> ClockSource for &C {
    fn now_millis(&self) -> i64 {
        (**self).now_millis()
    }
}

impl<C: ClockSource + ?Sized> ClockSource for Arc<C> {
    fn now_millis(&self) -> i64 {
        (**self).now_millis()
    }
}
