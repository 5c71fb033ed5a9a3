// Copyright 2022 houseme
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Derivation of a node id for allocators that are not given one.

use crate::allocator::MAX_NODE_ID;
use pnet_datalink::MacAddr;
use rand::Rng;
use std::fmt::Write;
use tracing::{debug, warn};

const FNV_OFFSET_BASIS: u64 = 0xcbf2_9ce4_8422_2325;
const FNV_PRIME: u64 = 0x0000_0100_0000_01b3;

/// Resolve a node id for this process.
///
/// The id is derived from the hardware addresses of the local network
/// interfaces, so it stays the same across restarts on the same host. If no
/// interface has a hardware address, or enumeration fails, a random id is
/// drawn instead. This never fails.
pub fn resolve() -> u16 {
    resolve_from(local_fingerprint())
}

/// Resolve a node id from an already collected fingerprint, falling back to a
/// random id when there is none.
pub fn resolve_from(fingerprint: Option<String>) -> u16 {
    match fingerprint {
        Some(fingerprint) => {
            let node_id = node_id_from_fingerprint(&fingerprint);
            debug!(
                fingerprint_len = fingerprint.len(),
                node_id, "derived node id from hardware addresses"
            );
            node_id
        }
        None => {
            let node_id = random_node_id();
            warn!(node_id, "no hardware address available, using a random node id");
            node_id
        }
    }
}

fn local_fingerprint() -> Option<String> {
    let interfaces = std::panic::catch_unwind(pnet_datalink::interfaces).ok()?;
    fingerprint(interfaces.iter().filter_map(|iface| iface.mac))
}

/// Concatenate the hex representation of every non-zero hardware address.
///
/// Returns `None` when no address contributes.
pub fn fingerprint<I>(macs: I) -> Option<String>
where
    I: IntoIterator<Item = MacAddr>,
{
    let mut out = String::new();
    for MacAddr(a, b, c, d, e, f) in macs {
        let octets = [a, b, c, d, e, f];
        if octets.iter().all(|&o| o == 0) {
            continue;
        }
        for octet in octets {
            // writing into a String cannot fail
            let _ = write!(out, "{:02X}", octet);
        }
    }
    if out.is_empty() { None } else { Some(out) }
}

/// Hash a fingerprint down to a 10-bit node id.
pub fn node_id_from_fingerprint(fingerprint: &str) -> u16 {
    let hash = fingerprint
        .bytes()
        .fold(FNV_OFFSET_BASIS, |h, b| (h ^ u64::from(b)).wrapping_mul(FNV_PRIME));
    // FNV's low bits are weak for short inputs, fold the high half in.
    let folded = hash ^ (hash >> 32);
    let folded = folded ^ (folded >> 16);
    (folded & u64::from(MAX_NODE_ID)) as u16
}

fn random_node_id() -> u16 {
    rand::rng().random_range(0..=MAX_NODE_ID)
}
