//! Lock-free string interning.
//!
//! The table is three segments:
//!
//! - `hashes`: one atomic `u32` per string, `0` for an unclaimed slot
//! - `entries`: the byte offset (plus one) of each string in `strings`,
//!   `0` until the claimer publishes it
//! - `strings`: bump-allocated runs of a little-endian `u32` length
//!   followed by the bytes, padded to 4-byte alignment
//!
//! Inserting claims `hashes[count]` with a CAS (see
//! [`tek_arena::claim_or_find`]), copies the bytes, then publishes the
//! entry with release ordering. A reader that finds a matching hash whose
//! entry is not published yet spins until it is, then compares bytes, so
//! an id is never returned before its string is readable.

use std::num::NonZeroU32;
use std::sync::atomic::{AtomicU32, AtomicU64, AtomicUsize, Ordering};

use crossbeam::utils::Backoff;
use tek_arena::{claim_or_find, Claim, SegmentSet, VirtMemError};

use crate::StrId;

const HASHES: usize = 0;
const ENTRIES: usize = 1;
const STRINGS: usize = 2;

const LEN_PREFIX: usize = 4;

/// Error when interning a string fails.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum InternError {
    #[error("string table is full ({capacity} strings)")]
    TableFull { capacity: usize },
    #[error("string of {len} bytes is too long to intern")]
    TooLong { len: usize },
}

/// 32-bit FNV-1 hash.
pub fn fnv1(bytes: &[u8]) -> u32 {
    let mut hash = 0x811c_9dc5_u32;
    for &byte in bytes {
        hash = hash.wrapping_mul(0x0100_0193);
        hash ^= u32::from(byte);
    }
    hash
}

/// Concurrent, append-only string interner.
///
/// Equal byte strings always get the same [`StrId`], different ones get
/// different ids, and ids stay valid for the life of the table. No lock is
/// taken on any path.
pub struct StringTable {
    segments: SegmentSet,
    count: AtomicU32,
    cursor: AtomicUsize,
    capacity: usize,
    hash_mask: u32,
}

impl StringTable {
    /// Reserves room for `max_strings` strings totalling about `max_bytes`.
    pub fn with_capacity(max_strings: usize, max_bytes: usize) -> Result<Self, VirtMemError> {
        Self::with_hash_mask(max_strings, max_bytes, u32::MAX)
    }

    /// Like [`StringTable::with_capacity`] but keeps only the hash bits in
    /// `hash_mask`. A tiny mask forces collisions.
    pub fn with_hash_mask(
        max_strings: usize,
        max_bytes: usize,
        hash_mask: u32,
    ) -> Result<Self, VirtMemError> {
        let max_strings = max_strings.max(1);
        let segments = SegmentSet::reserve(&[
            max_strings.saturating_mul(4),
            max_strings.saturating_mul(8),
            max_bytes.max(LEN_PREFIX),
        ])?;
        let capacity = segments
            .capacity_of::<AtomicU32>(HASHES)
            .min(segments.capacity_of::<AtomicU64>(ENTRIES));
        Ok(StringTable {
            segments,
            count: AtomicU32::new(0),
            cursor: AtomicUsize::new(0),
            capacity,
            hash_mask,
        })
    }

    /// Number of interned strings.
    pub fn len(&self) -> usize {
        self.count.load(Ordering::Acquire) as usize
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Maximum number of strings the table can hold.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Bytes consumed in the string arena, prefixes and padding included.
    pub fn bytes_used(&self) -> usize {
        self.cursor
            .load(Ordering::Relaxed)
            .min(self.segments.capacity(STRINGS))
    }

    /// Intern `bytes`, returning its id.
    ///
    /// Aborts the process if the table is out of room; use
    /// [`StringTable::try_get_or_insert`] to check first.
    pub fn get_or_insert(&self, bytes: impl AsRef<[u8]>) -> StrId {
        self.try_get_or_insert(bytes.as_ref())
            .unwrap_or_else(|err| tek_arena::fatal!("{err}"))
    }

    /// Intern `bytes`, or report why the table cannot take it.
    ///
    /// Running out of string bytes after a slot was claimed still aborts:
    /// other threads may already be waiting on that slot.
    pub fn try_get_or_insert(&self, bytes: &[u8]) -> Result<StrId, InternError> {
        if u32::try_from(bytes.len()).is_err() {
            return Err(InternError::TooLong { len: bytes.len() });
        }
        let hashes = &self.segments.slice::<AtomicU32>(HASHES)[..self.capacity];
        let claim = claim_or_find(hashes, &self.count, self.key(bytes), |slot| {
            self.wait_for(slot) == bytes
        })
        .map_err(|full| InternError::TableFull {
            capacity: full.capacity,
        })?;

        match claim {
            Claim::Existing(slot) => Ok(StrId::from_index(slot)),
            Claim::Claimed(slot) => {
                self.store(slot, bytes);
                tracing::trace!(slot, len = bytes.len(), "interned string");
                Ok(StrId::from_index(slot))
            }
        }
    }

    /// Finds `bytes` without inserting it.
    pub fn lookup(&self, bytes: impl AsRef<[u8]>) -> Option<StrId> {
        let bytes = bytes.as_ref();
        let key = self.key(bytes).get();
        let hashes = self.segments.slice::<AtomicU32>(HASHES);
        let count = self.len();
        (0..count)
            .find(|&slot| {
                hashes[slot].load(Ordering::Acquire) == key && self.wait_for(slot) == bytes
            })
            .map(StrId::from_index)
    }

    /// The bytes of `id`.
    ///
    /// # Panics
    ///
    /// Panics if `id` was not handed out by this table.
    pub fn get(&self, id: StrId) -> &[u8] {
        self.try_get(id)
            .unwrap_or_else(|| panic!("{id:?} is not a published string"))
    }

    /// The bytes of `id`, or `None` if it is not (yet) published.
    pub fn try_get(&self, id: StrId) -> Option<&[u8]> {
        let entries = self.segments.slice::<AtomicU64>(ENTRIES);
        let entry = entries.get(id.index())?.load(Ordering::Acquire);
        (entry != 0).then(|| self.read(entry))
    }

    /// The string of `id` if it is valid UTF-8.
    pub fn get_str(&self, id: StrId) -> Option<&str> {
        std::str::from_utf8(self.try_get(id)?).ok()
    }

    /// Forgets every string, returning the table's pages to the OS. Ids
    /// handed out before the reset must not be used afterwards.
    pub fn reset(&mut self) -> Result<(), VirtMemError> {
        self.segments.reset()?;
        *self.count.get_mut() = 0;
        *self.cursor.get_mut() = 0;
        Ok(())
    }

    fn key(&self, bytes: &[u8]) -> NonZeroU32 {
        // Zero marks an empty slot.
        NonZeroU32::new(fnv1(bytes) & self.hash_mask).unwrap_or(NonZeroU32::MIN)
    }

    /// Spins until `slot` has been published, then returns its bytes.
    fn wait_for(&self, slot: usize) -> &[u8] {
        let entries = self.segments.slice::<AtomicU64>(ENTRIES);
        let backoff = Backoff::new();
        loop {
            let entry = entries[slot].load(Ordering::Acquire);
            if entry != 0 {
                return self.read(entry);
            }
            backoff.snooze();
        }
    }

    #[allow(unsafe_code)]
    fn store(&self, slot: usize, bytes: &[u8]) {
        let Some(offset) = self
            .segments
            .bump(STRINGS, &self.cursor, LEN_PREFIX + bytes.len(), 4)
        else {
            tek_arena::fatal!(
                "string table byte arena exhausted ({} bytes)",
                self.segments.capacity(STRINGS)
            );
        };
        #[expect(
            clippy::cast_possible_truncation,
            reason = "length checked against u32::MAX by the caller"
        )]
        let prefix = (bytes.len() as u32).to_le_bytes();
        // SAFETY: the range was just bumped for this slot and nobody reads
        // it before the entry store below publishes it.
        unsafe {
            self.segments.write_bytes(STRINGS, offset, &prefix);
            self.segments.write_bytes(STRINGS, offset + LEN_PREFIX, bytes);
        }
        let entries = self.segments.slice::<AtomicU64>(ENTRIES);
        entries[slot].store(offset as u64 + 1, Ordering::Release);
    }

    #[allow(unsafe_code)]
    fn read(&self, entry: u64) -> &[u8] {
        #[expect(
            clippy::cast_possible_truncation,
            reason = "entries are offsets into a segment, which fits in usize"
        )]
        let offset = (entry - 1) as usize;
        // SAFETY: a non-zero entry was stored with release ordering after
        // the run was written (see `store`), the caller loaded it with
        // acquire ordering, and published runs are never written again.
        unsafe {
            let prefix = self.segments.read_bytes(STRINGS, offset, LEN_PREFIX);
            let len = u32::from_le_bytes([prefix[0], prefix[1], prefix[2], prefix[3]]) as usize;
            self.segments.read_bytes(STRINGS, offset + LEN_PREFIX, len)
        }
    }
}

impl std::fmt::Debug for StringTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StringTable")
            .field("len", &self.len())
            .field("bytes_used", &self.bytes_used())
            .finish_non_exhaustive()
    }
}
