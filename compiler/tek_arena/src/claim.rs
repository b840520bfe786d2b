//! Optimistic append-or-find over an atomic key table.
//!
//! Tables that deduplicate by key (interned strings by hash, files by path
//! id, library dependency lists by lib id) share one protocol:
//!
//! 1. scan `keys[0..count]` for the key, letting the caller confirm a
//!    candidate (hash collisions, unpublished payloads);
//! 2. on a miss, CAS `keys[count]` from the empty sentinel `0` to the key;
//! 3. the winner bumps `count` and owns the slot; a loser rescans from
//!    where it stopped with the fresh `count`.
//!
//! Only the slot at index `count` can ever be claimed, so `count` advances
//! strictly in slot order and every slot below it holds a key.

use std::num::NonZeroU32;
use std::sync::atomic::{AtomicU32, Ordering};

use crossbeam::utils::Backoff;

/// Outcome of [`claim_or_find`]. Both variants carry a 0-based slot index.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Claim {
    /// A confirmed slot already holding the key.
    Existing(usize),
    /// A fresh slot now owned by the caller, who must publish its payload.
    Claimed(usize),
}

/// Every slot of the table is taken.
#[derive(Clone, Copy, Debug, PartialEq, Eq, thiserror::Error)]
#[error("table is full ({capacity} slots)")]
pub struct TableFull {
    pub capacity: usize,
}

/// Finds `key` in `keys`, or claims the next free slot for it.
///
/// `confirm` is called for every slot whose key matches and decides whether
/// it is a real hit. It may spin until the slot's payload is published.
pub fn claim_or_find(
    keys: &[AtomicU32],
    count: &AtomicU32,
    key: NonZeroU32,
    mut confirm: impl FnMut(usize) -> bool,
) -> Result<Claim, TableFull> {
    let key = key.get();
    let capacity = keys.len().min(u32::MAX as usize);
    let backoff = Backoff::new();
    let mut scanned = 0usize;
    loop {
        let end = count.load(Ordering::Acquire) as usize;
        for index in scanned..end {
            if keys[index].load(Ordering::Acquire) == key && confirm(index) {
                return Ok(Claim::Existing(index));
            }
        }
        scanned = scanned.max(end);

        if end >= capacity {
            return Err(TableFull { capacity });
        }
        match keys[end].compare_exchange(0, key, Ordering::AcqRel, Ordering::Acquire) {
            Ok(_) => {
                count.fetch_add(1, Ordering::AcqRel);
                return Ok(Claim::Claimed(end));
            }
            // Someone claimed slot `end` after we read `count`; wait for
            // them to bump it, then look at their key too.
            Err(_) => backoff.snooze(),
        }
    }
}
