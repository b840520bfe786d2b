//! Records written in place into a segment and published with a ready flag.

use std::cell::UnsafeCell;
use std::mem::{self, MaybeUninit};
use std::sync::atomic::{AtomicU8, Ordering};

use crossbeam::utils::Backoff;

use crate::{SegmentSet, ZeroInit};

const EMPTY: u8 = 0;
const WRITING: u8 = 1;
const READY: u8 = 2;

/// One record slot: a state byte followed by room for the record.
///
/// The zeroed slot is empty, so fresh segment pages are a table of empty
/// slots.
#[repr(C)]
pub struct PublishSlot<T> {
    state: AtomicU8,
    record: UnsafeCell<MaybeUninit<T>>,
}

// SAFETY: a zero state is `EMPTY` and `MaybeUninit` accepts any bytes. The
// record itself is only dropped by `SegmentSet::drop_published`.
#[allow(unsafe_code)]
unsafe impl<T> ZeroInit for PublishSlot<T> {}

// SAFETY: the record is written once, by the thread whose CAS moved the
// state from `EMPTY` to `WRITING`, and is only shared after `READY` is
// stored with release ordering. From then on it is read-only.
#[allow(unsafe_code)]
unsafe impl<T: Send + Sync> Sync for PublishSlot<T> {}

/// A view of one segment as a table of write-once records.
///
/// A slot is claimed elsewhere (usually via [`crate::claim_or_find`]); the
/// claimer moves the record into the slot and marks it ready with release
/// ordering. Readers that found the slot through its key spin in
/// [`PublishSlots::wait`] until the record appears.
///
/// Records live in the segment itself and stay there until the owner of
/// the [`SegmentSet`] calls [`SegmentSet::drop_published`].
pub struct PublishSlots<'a, T> {
    slots: &'a [PublishSlot<T>],
}

impl SegmentSet {
    /// Views segment `index` as publish slots for `T`.
    pub fn publish_slots<T: Send + Sync>(&self, index: usize) -> PublishSlots<'_, T> {
        PublishSlots {
            slots: self.slice(index),
        }
    }

    /// Drops the records published in the first `len` slots of segment
    /// `index` and marks those slots empty again.
    #[allow(unsafe_code)]
    pub fn drop_published<T: Send + Sync>(&mut self, index: usize, len: usize) {
        let slots = self.slice_mut::<PublishSlot<T>>(index);
        let len = len.min(slots.len());
        for slot in &mut slots[..len] {
            if mem::replace(slot.state.get_mut(), EMPTY) == READY {
                // SAFETY: `READY` means the record was fully written, and
                // `&mut self` means no reference from `get`/`wait` is alive.
                unsafe { slot.record.get_mut().assume_init_drop() };
            }
        }
    }
}

impl<'a, T: Send + Sync> PublishSlots<'a, T> {
    /// Segment bytes needed for `count` slots.
    pub fn bytes_for(count: usize) -> usize {
        count.saturating_mul(mem::size_of::<PublishSlot<T>>())
    }

    /// Number of slots in the segment.
    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Moves `record` into `slot` and publishes it.
    ///
    /// Fails, handing the record back, if the slot was already taken.
    #[allow(unsafe_code)]
    pub fn publish(&self, slot: usize, record: T) -> Result<&'a T, T> {
        let cell: &'a PublishSlot<T> = &self.slots[slot];
        if cell
            .state
            .compare_exchange(EMPTY, WRITING, Ordering::Acquire, Ordering::Relaxed)
            .is_err()
        {
            return Err(record);
        }
        let ptr = cell.record.get().cast::<T>();
        // SAFETY: winning the CAS gives this thread the only access to the
        // record until `READY` is stored.
        unsafe { ptr.write(record) };
        cell.state.store(READY, Ordering::Release);
        // SAFETY: just initialised, and never written again while `'a` lasts
        // (`drop_published` needs `&mut SegmentSet`).
        Ok(unsafe { &*ptr })
    }

    /// The record in `slot`, if published.
    #[allow(unsafe_code)]
    pub fn get(&self, slot: usize) -> Option<&'a T> {
        let cell: &'a PublishSlot<T> = self.slots.get(slot)?;
        if cell.state.load(Ordering::Acquire) != READY {
            return None;
        }
        // SAFETY: the acquire load of `READY` orders the record's write
        // before this read, and published records are never written again.
        Some(unsafe { &*cell.record.get().cast::<T>() })
    }

    /// Spins until `slot` is published and returns its record.
    pub fn wait(&self, slot: usize) -> &'a T {
        let backoff = Backoff::new();
        loop {
            if let Some(record) = self.get(slot) {
                return record;
            }
            backoff.snooze();
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests;
