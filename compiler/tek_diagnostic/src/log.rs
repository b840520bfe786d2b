//! The shared, append-only error log.

use std::sync::atomic::{AtomicU32, Ordering};

use tek_arena::{PublishSlots, SegmentSet, VirtMemError};
use tek_ir::{FileId, StrId};

use crate::ErrorKind;

const ERRORS: usize = 0;

/// One argument of an [`Error`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ErrorArg {
    #[default]
    None,
    /// A token of a lexed file.
    Token { file: FileId, token: u32 },
    /// A registered file (rendered as its path).
    File(FileId),
    /// An interned path or other string.
    Str(StrId),
    /// A raw OS error code.
    Errno(i32),
    /// A byte offset or count.
    Num(u64),
}

/// A structured diagnostic: a kind plus up to two arguments.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Error {
    pub kind: ErrorKind,
    pub args: [ErrorArg; 2],
}

impl Error {
    pub fn new(kind: ErrorKind, first: ErrorArg, second: ErrorArg) -> Self {
        Error {
            kind,
            args: [first, second],
        }
    }

    /// An error pointing at one token.
    pub fn at_token(kind: ErrorKind, file: FileId, token: u32) -> Self {
        Self::new(kind, ErrorArg::Token { file, token }, ErrorArg::None)
    }

    /// An error pointing at two tokens of the same file.
    pub fn at_tokens(kind: ErrorKind, file: FileId, first: u32, second: u32) -> Self {
        Self::new(
            kind,
            ErrorArg::Token { file, token: first },
            ErrorArg::Token {
                file,
                token: second,
            },
        )
    }

    /// The file the error is about, if any.
    pub fn file(&self) -> Option<FileId> {
        match self.args[0] {
            ErrorArg::Token { file, .. } | ErrorArg::File(file) => Some(file),
            _ => None,
        }
    }
}

/// Fixed-capacity, lock-free error log.
///
/// [`ErrorLog::add`] reserves a slot with one atomic increment and then
/// writes the record into that slot of the log's segment, so concurrent
/// writers never contend on a lock. Readers see records in slot order;
/// reading is only complete once every writer has finished.
pub struct ErrorLog {
    segments: SegmentSet,
    reserved: AtomicU32,
    capacity: usize,
}

impl ErrorLog {
    pub fn with_capacity(max_errors: usize) -> Result<Self, VirtMemError> {
        let bytes = PublishSlots::<Error>::bytes_for(max_errors.max(1));
        let segments = SegmentSet::reserve(&[bytes])?;
        let capacity = segments
            .publish_slots::<Error>(ERRORS)
            .capacity()
            .min(u32::MAX as usize);
        Ok(ErrorLog {
            segments,
            reserved: AtomicU32::new(0),
            capacity,
        })
    }

    /// Appends `error`, returning its slot. Aborts if the log is full.
    pub fn add(&self, error: Error) -> usize {
        let slot = self.reserved.fetch_add(1, Ordering::AcqRel) as usize;
        if slot >= self.capacity {
            tek_arena::fatal!("error log is full ({} errors)", self.capacity);
        }
        tracing::debug!(slot, kind = ?error.kind, "error logged");
        let slots = self.segments.publish_slots::<Error>(ERRORS);
        if slots.publish(slot, error).is_err() {
            tek_arena::fatal!("error slot {slot} published twice");
        }
        slot
    }

    pub fn has_errors(&self) -> bool {
        self.len() > 0
    }

    /// Number of reserved slots.
    pub fn len(&self) -> usize {
        (self.reserved.load(Ordering::Acquire) as usize).min(self.capacity)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn get(&self, slot: usize) -> Option<&Error> {
        self.segments.publish_slots::<Error>(ERRORS).get(slot)
    }

    /// Published errors in slot order.
    pub fn iter(&self) -> impl Iterator<Item = &Error> + '_ {
        let slots = self.segments.publish_slots::<Error>(ERRORS);
        (0..self.len()).filter_map(move |slot| slots.get(slot))
    }

    /// How many errors of `kind` were logged.
    pub fn count_of(&self, kind: ErrorKind) -> usize {
        self.iter().filter(|error| error.kind == kind).count()
    }

    /// Empties the log for another run, returning its pages to the OS.
    pub fn reset(&mut self) -> Result<(), VirtMemError> {
        let len = self.len();
        self.segments.drop_published::<Error>(ERRORS, len);
        self.segments.reset()?;
        *self.reserved.get_mut() = 0;
        Ok(())
    }
}

impl std::fmt::Debug for ErrorLog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list().entries(self.iter()).finish()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests;
