//! Atomic bump allocation of byte runs inside a segment.

use std::ptr;
use std::slice;
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::SegmentSet;

impl SegmentSet {
    /// Reserves `len` bytes, rounded up to `align`, from segment `index`.
    ///
    /// `cursor` is the shared fill level of the segment. Returns the byte
    /// offset of the run, or `None` once the segment is exhausted (the
    /// cursor then stays past the end, so later calls fail too).
    pub fn bump(
        &self,
        index: usize,
        cursor: &AtomicUsize,
        len: usize,
        align: usize,
    ) -> Option<usize> {
        debug_assert!(align.is_power_of_two());
        let size = len.checked_add(align - 1)? & !(align - 1);
        let offset = cursor.fetch_add(size, Ordering::Relaxed);
        let end = offset.checked_add(size)?;
        (end <= self.capacity(index)).then_some(offset)
    }

    /// Copies `bytes` into segment `index` at `offset`.
    ///
    /// # Safety
    ///
    /// The range must come from [`SegmentSet::bump`] on the same segment,
    /// and no other thread may read it until the writer publishes it with
    /// release ordering.
    #[allow(unsafe_code)]
    pub unsafe fn write_bytes(&self, index: usize, offset: usize, bytes: &[u8]) {
        let (base, capacity) = self.raw_parts::<u8>(index);
        assert!(offset.saturating_add(bytes.len()) <= capacity, "write past segment end");
        // SAFETY: in bounds (checked above) and exclusively owned by the
        // caller per this function's contract.
        unsafe { ptr::copy_nonoverlapping(bytes.as_ptr(), base.add(offset), bytes.len()) }
    }

    /// Reads `len` bytes of segment `index` starting at `offset`.
    ///
    /// # Safety
    ///
    /// The range must have been fully written by [`SegmentSet::write_bytes`]
    /// and published to this thread (acquire load of the publishing store),
    /// and must never be written again.
    #[allow(unsafe_code)]
    pub unsafe fn read_bytes(&self, index: usize, offset: usize, len: usize) -> &[u8] {
        let (base, capacity) = self.raw_parts::<u8>(index);
        assert!(offset.saturating_add(len) <= capacity, "read past segment end");
        // SAFETY: in bounds, and immutable from here on per the contract.
        unsafe { slice::from_raw_parts(base.add(offset), len) }
    }
}
