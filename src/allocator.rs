// Copyright 2022 houseme
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

use crate::builder::Builder;
use crate::clock::{ClockSource, SystemClock};
use crate::error::*;
use chrono::prelude::*;
use std::{
    fmt,
    hint,
    sync::{Arc, Mutex},
};
use tracing::{error, trace, warn};

/// bit length of the timestamp delta
pub const BIT_LEN_TIMESTAMP: u8 = 41;
/// bit length of the node id
pub const BIT_LEN_NODE_ID: u8 = 10;
/// bit length of the per-millisecond sequence
pub const BIT_LEN_SEQUENCE: u8 = 12;

/// largest node id an allocator accepts
pub const MAX_NODE_ID: u16 = (1 << BIT_LEN_NODE_ID) - 1;
/// largest sequence value issued within one millisecond
pub const MAX_SEQUENCE: u16 = (1 << BIT_LEN_SEQUENCE) - 1;
/// largest timestamp delta, about 69 years past the epoch
pub const MAX_TIMESTAMP: i64 = (1 << BIT_LEN_TIMESTAMP) - 1;

/// 2011-01-01T00:00:00Z in milliseconds. Never change this once ids exist.
pub const DEFAULT_CUSTOM_EPOCH: i64 = 1_293_840_000_000;

const NODE_ID_SHIFT: u8 = BIT_LEN_SEQUENCE;
const TIMESTAMP_SHIFT: u8 = BIT_LEN_NODE_ID + BIT_LEN_SEQUENCE;

/// Mutable state of an allocator, only touched under its lock.
#[derive(Debug)]
pub(crate) struct Internals {
    pub(crate) last_timestamp: i64,
    pub(crate) sequence: u16,
}

impl Internals {
    pub(crate) fn new() -> Self {
        Self {
            last_timestamp: -1,
            sequence: 0,
        }
    }
}

/// State shared by every clone of one [`IdAllocator`].
pub(crate) struct SharedAllocator<C> {
    pub(crate) custom_epoch: i64,
    pub(crate) node_id: u16,
    pub(crate) clock: C,
    pub(crate) internals: Mutex<Internals>,
}

/// A time-ordered 64-bit id allocator.
///
/// Construct one per process at startup and hand it (or a clone of it) to
/// every call site that needs ids. Clones share the same state.
pub struct IdAllocator<C = SystemClock>(pub(crate) Arc<SharedAllocator<C>>);

impl IdAllocator<SystemClock> {
    /// Create an allocator with a resolved node id and the default epoch.
    /// For custom configuration see [`builder`].
    ///
    /// [`builder`]: struct.IdAllocator.html#method.builder
    pub fn new() -> Result<Self, Error> {
        Builder::new().finalize()
    }

    /// Create an allocator for `node_id` with the default epoch.
    pub fn with_node_id(node_id: i64) -> Result<Self, Error> {
        Builder::new().node_id(node_id).finalize()
    }

    /// Create an allocator for `node_id` counting from `custom_epoch`
    /// (milliseconds since the Unix epoch).
    pub fn with_node_id_and_epoch(node_id: i64, custom_epoch: i64) -> Result<Self, Error> {
        Builder::new()
            .node_id(node_id)
            .epoch_millis(custom_epoch)
            .finalize()
    }

    /// Create a new [`Builder`] to construct an allocator.
    ///
    /// [`Builder`]: struct.Builder.html
    pub fn builder<'a>() -> Builder<'a> {
        Builder::new()
    }
}

impl<C: ClockSource> IdAllocator<C> {
    pub(crate) fn new_inner(shared: Arc<SharedAllocator<C>>) -> Self {
        Self(shared)
    }

    /// Allocate the next id.
    ///
    /// Fails with [`Error::ClockMovedBackwards`] if the clock reads earlier than
    /// the last issued timestamp and with [`Error::EpochExhausted`] once the
    /// timestamp outgrows its field. A failed call leaves the state untouched.
    ///
    /// When all 4096 sequence values of a millisecond are used, the call spins
    /// until the clock advances. The spin holds the lock, so other callers wait
    /// at most about one millisecond.
    pub fn next_id(&self) -> Result<u64, Error> {
        let mut internals = self.0.internals.lock().map_err(|_| Error::MutexPoisoned)?;

        let mut current = self.elapsed_millis();
        if current < internals.last_timestamp || current < 0 {
            error!(
                last_timestamp = internals.last_timestamp,
                current_timestamp = current,
                node_id = self.0.node_id,
                "clock moved backwards, refusing to allocate"
            );
            return Err(Error::ClockMovedBackwards {
                last_timestamp: internals.last_timestamp,
                current_timestamp: current,
            });
        }

        let sequence = if current == internals.last_timestamp {
            let next = (internals.sequence + 1) & MAX_SEQUENCE;
            if next == 0 {
                trace!(timestamp = current, "sequence exhausted, waiting for next millisecond");
                current = self.wait_next_millis(internals.last_timestamp);
            }
            next
        } else {
            0
        };

        if current > MAX_TIMESTAMP {
            warn!(timestamp = current, "timestamp field exhausted");
            return Err(Error::EpochExhausted(current));
        }

        internals.last_timestamp = current;
        internals.sequence = sequence;

        Ok(compose(current as u64, self.0.node_id, sequence))
    }

    /// The node id encoded into every id of this allocator.
    pub fn node_id(&self) -> u16 {
        self.0.node_id
    }

    /// The custom epoch, in milliseconds since the Unix epoch.
    pub fn epoch_millis(&self) -> i64 {
        self.0.custom_epoch
    }

    /// Wall-clock time at which `id` was allocated, assuming it came from an
    /// allocator with the same epoch.
    pub fn created_at(&self, id: u64) -> Option<DateTime<Utc>> {
        Utc.timestamp_millis_opt(decompose(id).unix_millis(self.0.custom_epoch))
            .single()
    }

    // Saturates so an overflowing delta lands above MAX_TIMESTAMP and an
    // underflowing one below zero.
    fn elapsed_millis(&self) -> i64 {
        self.0.clock.now_millis().saturating_sub(self.0.custom_epoch)
    }

    fn wait_next_millis(&self, last_timestamp: i64) -> i64 {
        let mut current = self.elapsed_millis();
        while current <= last_timestamp {
            hint::spin_loop();
            current = self.elapsed_millis();
        }
        current
    }
}

/// Returns a new `IdAllocator` referencing the same state as `self`.
impl<C> Clone for IdAllocator<C> {
    fn clone(&self) -> Self {
        Self(self.0.clone())
    }
}

impl<C> fmt::Display for IdAllocator<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "IdAllocator settings [timestamp_bits={}, node_id_bits={}, sequence_bits={}, custom_epoch={}, node_id={}]",
            BIT_LEN_TIMESTAMP,
            BIT_LEN_NODE_ID,
            BIT_LEN_SEQUENCE,
            self.0.custom_epoch,
            self.0.node_id
        )
    }
}

impl<C> fmt::Debug for IdAllocator<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IdAllocator")
            .field("timestamp_bits", &BIT_LEN_TIMESTAMP)
            .field("node_id_bits", &BIT_LEN_NODE_ID)
            .field("sequence_bits", &BIT_LEN_SEQUENCE)
            .field("custom_epoch", &self.0.custom_epoch)
            .field("node_id", &self.0.node_id)
            .finish()
    }
}

fn compose(timestamp: u64, node_id: u16, sequence: u16) -> u64 {
    timestamp << TIMESTAMP_SHIFT | u64::from(node_id) << NODE_ID_SHIFT | u64::from(sequence)
}

/// DecomposedId is the parts of an allocated id.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DecomposedId {
    pub id: u64,
    pub timestamp: u64,
    pub node_id: u16,
    pub sequence: u16,
}

impl DecomposedId {
    /// Reassemble the id from its parts.
    pub fn compose(&self) -> u64 {
        compose(self.timestamp, self.node_id, self.sequence)
    }

    /// Milliseconds since the Unix epoch, given the allocator's custom epoch.
    pub fn unix_millis(&self, custom_epoch: i64) -> i64 {
        self.timestamp as i64 + custom_epoch
    }
}

/// Break an id up into its parts.
pub fn decompose(id: u64) -> DecomposedId {
    DecomposedId {
        id,
        timestamp: id >> TIMESTAMP_SHIFT,
        node_id: ((id >> NODE_ID_SHIFT) & u64::from(MAX_NODE_ID)) as u16,
        sequence: (id & u64::from(MAX_SEQUENCE)) as u16,
    }
}
