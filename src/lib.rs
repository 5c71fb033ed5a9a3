//! A time-ordered 64-bit id allocator inspired by [Twitter's Snowflake].
//!
//! Every id packs a 41-bit millisecond timestamp (counted from a custom
//! epoch), a 10-bit node id and a 12-bit per-millisecond sequence:
//!
//! ```text
//! | 41 bits: timestamp | 10 bits: node id | 12 bits: sequence |
//! ```
//!
//! Nodes never talk to each other; distinct node ids keep their ids apart.
//!
//! ## Quickstart
//!
//! ```
//! use flake_alloc::IdAllocator;
//!
//! let alloc = IdAllocator::with_node_id(42).unwrap();
//! let next_id = alloc.next_id().unwrap();
//! println!("{}", next_id);
//! ```
//!
//! Leave out the node id and one is derived from the hardware addresses of
//! the local network interfaces. A node id can also come from outside:
//!
//! ```
//! use flake_alloc::{BoxDynError, IdAllocator};
//!
//! let from_env = || -> Result<i64, BoxDynError> {
//!     Ok(std::env::var("NODE_ID").unwrap_or_else(|_| "3".into()).parse()?)
//! };
//! let alloc = IdAllocator::builder().node_id_fn(&from_env).finalize().unwrap();
//! println!("{}", alloc);
//! ```
//!
//! ## Concurrent use
//!
//! `IdAllocator` is thread-safe. `clone` it before moving to another thread,
//! clones share the same sequence:
//! ```
//! use flake_alloc::IdAllocator;
//! use std::thread;
//!
//! let alloc = IdAllocator::with_node_id(1).unwrap();
//!
//! let mut children = Vec::new();
//! for _ in 0..10 {
//!     let thread_alloc = alloc.clone();
//!     children.push(thread::spawn(move || {
//!         println!("{}", thread_alloc.next_id().unwrap());
//!     }));
//! }
//!
//! for child in children {
//!     child.join().unwrap();
//! }
//! ```
//!
//! [Twitter's Snowflake]: https://blog.twitter.com/2010/announcing-snowflake

mod allocator;
mod builder;
mod clock;
mod error;
pub mod node_id;

pub use crate::allocator::*;
pub use builder::*;
pub use clock::*;
pub use error::*;
