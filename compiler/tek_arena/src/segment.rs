//! Contiguous multi-segment reservations with trailing guard pages.

use std::fmt;
use std::mem;
use std::ptr::NonNull;
use std::slice;

use crate::os;
use crate::{page_size, VirtMemError, ZeroInit};

#[derive(Clone, Copy, Debug)]
struct Segment {
    offset: usize,
    capacity: usize,
}

/// A set of segments reserved as one address range.
///
/// Layout for sizes `[a, b]` (each rounded up to whole pages):
///
/// ```text
/// | a bytes | guard | b bytes | guard |
/// ```
///
/// Every page reads as zero until written. Guard pages are `PROT_NONE`, so
/// running off the end of a segment faults instead of corrupting the next
/// one. The reservation is unmapped on drop.
pub struct SegmentSet {
    base: NonNull<u8>,
    len: usize,
    segments: Box<[Segment]>,
}

// SAFETY: the set owns its mapping. Shared access only hands out element
// types that are `Sync`; unsynchronised byte writes go through `unsafe`
// methods whose callers own the written range exclusively.
#[allow(unsafe_code)]
unsafe impl Send for SegmentSet {}
#[allow(unsafe_code)]
unsafe impl Sync for SegmentSet {}

impl SegmentSet {
    /// Reserves one segment per entry of `sizes`, plus a guard page each.
    #[allow(unsafe_code)]
    pub fn reserve(sizes: &[usize]) -> Result<Self, VirtMemError> {
        if sizes.is_empty() {
            return Err(VirtMemError::Empty);
        }
        let page = page_size();
        let mut segments = Vec::with_capacity(sizes.len());
        let mut len = 0usize;
        for (index, &size) in sizes.iter().enumerate() {
            if size == 0 {
                return Err(VirtMemError::ZeroSize { index });
            }
            let capacity = round_to_page(size, page).ok_or(VirtMemError::TooLarge)?;
            segments.push(Segment {
                offset: len,
                capacity,
            });
            len = len
                .checked_add(capacity)
                .and_then(|len| len.checked_add(page))
                .ok_or(VirtMemError::TooLarge)?;
        }

        let base = os::reserve(len).map_err(|source| VirtMemError::Reserve { bytes: len, source })?;
        // Constructed before the guards go up so a failure below unmaps.
        let set = SegmentSet {
            base,
            len,
            segments: segments.into_boxed_slice(),
        };
        for segment in set.segments.iter() {
            let guard = set.ptr_at(segment.offset + segment.capacity);
            // SAFETY: the guard page sits inside our reservation and nothing
            // has been handed out yet.
            unsafe { os::protect_none(guard, page) }
                .map_err(|source| VirtMemError::Protect { source })?;
        }
        tracing::trace!(segments = sizes.len(), bytes = len, "reserved segment set");
        Ok(set)
    }

    /// Number of segments in the set.
    pub fn len(&self) -> usize {
        self.segments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    /// Usable bytes in segment `index` (a whole number of pages).
    pub fn capacity(&self, index: usize) -> usize {
        self.segments[index].capacity
    }

    /// Number of `T` elements that fit in segment `index`.
    pub fn capacity_of<T>(&self, index: usize) -> usize {
        match mem::size_of::<T>() {
            0 => 0,
            size => self.segments[index].capacity / size,
        }
    }

    /// Start address of segment `index`. Stable for the life of the set.
    pub fn addr(&self, index: usize) -> usize {
        self.ptr_at(self.segments[index].offset).as_ptr() as usize
    }

    /// Shared view of segment `index` as a slice of `T`.
    ///
    /// Intended for atomic element types; writes from other threads go
    /// through the atomics themselves.
    #[allow(unsafe_code)]
    pub fn slice<T: ZeroInit + Sync>(&self, index: usize) -> &[T] {
        let (ptr, len) = self.raw_parts::<T>(index);
        // SAFETY: the range is inside our mapping, page aligned (so aligned
        // for T), zero-valid for T, and lives as long as `&self`. Mutable
        // views require `&mut self`.
        unsafe { slice::from_raw_parts(ptr, len) }
    }

    /// Exclusive view of segment `index` as a slice of `T`.
    #[allow(unsafe_code)]
    pub fn slice_mut<T: ZeroInit>(&mut self, index: usize) -> &mut [T] {
        let (ptr, len) = self.raw_parts::<T>(index);
        // SAFETY: as for `slice`, and `&mut self` rules out any other view.
        unsafe { slice::from_raw_parts_mut(ptr, len) }
    }

    /// Returns every page to the OS. The reservation and guard pages stay
    /// in place and all segments read as zero again.
    #[allow(unsafe_code)]
    pub fn reset(&mut self) -> Result<(), VirtMemError> {
        for segment in self.segments.iter() {
            let start = self.ptr_at(segment.offset);
            // SAFETY: `&mut self` guarantees no outstanding views, and the
            // range excludes the guard page.
            unsafe { os::decommit(start, segment.capacity) }
                .map_err(|source| VirtMemError::Reset { source })?;
        }
        Ok(())
    }

    /// Unmaps the reservation, reporting any OS failure.
    ///
    /// Dropping the set does the same but can only log failures.
    #[allow(unsafe_code)]
    pub fn release(mut self) -> Result<(), VirtMemError> {
        // SAFETY: the set is consumed, so nothing can reference it any more.
        let result = unsafe { os::release(self.base, self.len) };
        // Zero length tells `drop` the mapping is gone.
        self.len = 0;
        result.map_err(|source| VirtMemError::Release { source })
    }

    #[allow(unsafe_code)]
    fn ptr_at(&self, offset: usize) -> NonNull<u8> {
        debug_assert!(offset <= self.len);
        // SAFETY: offsets never exceed the reservation length.
        unsafe { NonNull::new_unchecked(self.base.as_ptr().add(offset)) }
    }

    #[allow(clippy::cast_ptr_alignment)]
    pub(crate) fn raw_parts<T>(&self, index: usize) -> (*mut T, usize) {
        assert!(
            mem::align_of::<T>() <= page_size(),
            "element alignment exceeds the page size"
        );
        let segment = self.segments[index];
        (
            self.ptr_at(segment.offset).as_ptr().cast::<T>(),
            self.capacity_of::<T>(index),
        )
    }
}

impl Drop for SegmentSet {
    #[allow(unsafe_code)]
    fn drop(&mut self) {
        if self.len == 0 {
            return;
        }
        // SAFETY: dropping means nothing borrows the set any more.
        if let Err(err) = unsafe { os::release(self.base, self.len) } {
            tracing::warn!(%err, "failed to release segment set");
        }
    }
}

impl fmt::Debug for SegmentSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SegmentSet")
            .field("base", &self.base)
            .field("len", &self.len)
            .field("segments", &self.segments)
            .finish()
    }
}

fn round_to_page(size: usize, page: usize) -> Option<usize> {
    size.checked_add(page - 1).map(|size| size / page * page)
}
