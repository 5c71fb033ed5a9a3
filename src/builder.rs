// Copyright 2022 houseme
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

use crate::allocator::{
    IdAllocator, Internals, SharedAllocator, BIT_LEN_TIMESTAMP, DEFAULT_CUSTOM_EPOCH, MAX_NODE_ID,
    MAX_TIMESTAMP,
};
use crate::clock::{ClockSource, SystemClock};
use crate::error::{BoxDynError, Error};
use crate::node_id;
use chrono::prelude::*;
use std::sync::{Arc, Mutex};
use tracing::info;

/// A builder for building the [`IdAllocator`].
///
/// [`IdAllocator`]: struct.IdAllocator.html
pub struct Builder<'a, C = SystemClock> {
    custom_epoch: Option<i64>,
    node_id: Option<i64>,
    node_id_fn: Option<&'a dyn Fn() -> Result<i64, BoxDynError>>,
    check_node_id: Option<&'a dyn Fn(u16) -> bool>,
    clock: C,
}

impl<'a> Default for Builder<'a> {
    fn default() -> Self {
        Builder::new()
    }
}

impl<'a> Builder<'a> {
    /// Construct a new builder for the build of [`IdAllocator`].
    ///
    /// [`IdAllocator`]: struct.IdAllocator.html
    pub fn new() -> Self {
        Self {
            custom_epoch: None,
            node_id: None,
            node_id_fn: None,
            check_node_id: None,
            clock: SystemClock,
        }
    }
}

impl<'a, C: ClockSource> Builder<'a, C> {
    /// Set the custom epoch.
    /// If the epoch is later than the current time, `finalize` will fail.
    pub fn epoch(self, epoch: DateTime<Utc>) -> Self {
        self.epoch_millis(epoch.timestamp_millis())
    }

    /// Set the custom epoch in milliseconds since the Unix epoch.
    pub fn epoch_millis(mut self, custom_epoch: i64) -> Self {
        self.custom_epoch = Some(custom_epoch);
        self
    }

    /// Set the node id.
    /// Values outside `0..=1023` make `finalize` fail.
    pub fn node_id(mut self, node_id: i64) -> Self {
        self.node_id = Some(node_id);
        self
    }

    /// Set a function supplying the node id, e.g. from the environment.
    /// If the function returns an error, `finalize` will fail.
    /// An explicit [`node_id`](Self::node_id) takes precedence.
    pub fn node_id_fn(mut self, node_id_fn: &'a dyn Fn() -> Result<i64, BoxDynError>) -> Self {
        self.node_id_fn = Some(node_id_fn);
        self
    }

    /// Set up a function to check the node id.
    /// If the function returns `false`, `finalize` will fail.
    pub fn check_node_id(mut self, check_node_id: &'a dyn Fn(u16) -> bool) -> Self {
        self.check_node_id = Some(check_node_id);
        self
    }

    /// Replace the clock the allocator reads.
    pub fn clock<D: ClockSource>(self, clock: D) -> Builder<'a, D> {
        Builder {
            custom_epoch: self.custom_epoch,
            node_id: self.node_id,
            node_id_fn: self.node_id_fn,
            check_node_id: self.check_node_id,
            clock,
        }
    }

    /// Finish building and create an allocator.
    /// Without an explicit node id or provider, the node id is derived from
    /// the local network interfaces.
    pub fn finalize(self) -> Result<IdAllocator<C>, Error> {
        let (raw_node_id, source) = match (self.node_id, self.node_id_fn) {
            (Some(node_id), _) => (node_id, "explicit"),
            (None, Some(node_id_fn)) => (node_id_fn().map_err(Error::NodeIdFailed)?, "provider"),
            (None, None) => (i64::from(node_id::resolve()), "resolved"),
        };

        let node_id = u16::try_from(raw_node_id)
            .ok()
            .filter(|&id| id <= MAX_NODE_ID)
            .ok_or_else(|| {
                Error::InvalidConfiguration(format!(
                    "node id {} must be between 0 and {}",
                    raw_node_id, MAX_NODE_ID
                ))
            })?;

        if let Some(check_node_id) = self.check_node_id {
            if !check_node_id(node_id) {
                return Err(Error::CheckNodeIdFailed(node_id));
            }
        }

        let custom_epoch = self.custom_epoch.unwrap_or(DEFAULT_CUSTOM_EPOCH);
        let now = self.clock.now_millis();
        if custom_epoch > now {
            return Err(Error::InvalidConfiguration(format!(
                "custom epoch {}ms is ahead of current time {}ms",
                custom_epoch, now
            )));
        }
        match now.checked_sub(custom_epoch) {
            Some(elapsed) if elapsed <= MAX_TIMESTAMP => {}
            _ => {
                return Err(Error::InvalidConfiguration(format!(
                    "custom epoch {}ms is too far behind current time {}ms for a {}-bit timestamp",
                    custom_epoch, now, BIT_LEN_TIMESTAMP
                )));
            }
        }

        info!(node_id, source, custom_epoch, "id allocator configured");

        let shared = Arc::new(SharedAllocator {
            custom_epoch,
            node_id,
            clock: self.clock,
            internals: Mutex::new(Internals::new()),
        });
        Ok(IdAllocator::new_inner(shared))
    }
}
