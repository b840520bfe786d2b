//! Virtual-memory segment arenas for the Tek compiler.
//!
//! Every shared table in the compiler (string table, error log, job pool,
//! file and library registries, per-file token and syntax arrays) lives in
//! a [`SegmentSet`]: one contiguous reservation split into segments, each
//! followed by a no-access guard page. Segments never move, so references
//! and indices handed out by them stay valid until the set is released.
//! Pages are only backed by physical memory once they are touched, which
//! is what makes multi-gigabyte reservations cheap.
//!
//! On top of raw segments the crate provides the lock-free building blocks
//! the compiler shares between workers:
//!
//! - [`SegmentSet::bump`]: atomic bump allocation of byte runs.
//! - [`claim_or_find`]: the optimistic "scan, then CAS the next slot" append.
//! - [`PublishSlots`]: records written in place and published with release
//!   ordering.
//!
//! Only Unix targets are supported.

mod bump;
mod claim;
mod error;
mod fatal;
mod os;
mod publish;
mod segment;
mod zero;

pub use claim::{claim_or_find, Claim, TableFull};
pub use error::VirtMemError;
pub use fatal::abort;
pub use os::page_size;
pub use publish::{PublishSlot, PublishSlots};
pub use segment::SegmentSet;
pub use zero::ZeroInit;
