//! The compiler's atomic state flags word.

use std::sync::atomic::{AtomicU32, Ordering};

bitflags::bitflags! {
    /// Run state shared by the driver, the scheduler and every worker.
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
    pub struct RunFlags: u32 {
        /// Workers exit at their next call into the scheduler.
        const STOPPING = 1 << 0;
        /// A table ran out of reserved memory.
        const OUT_OF_MEMORY = 1 << 1;
        /// Workers are being spawned and wait at the start barrier.
        const STARTING_UP = 1 << 2;
        /// Workers are past the start barrier.
        const RUNNING = 1 << 3;
    }
}

/// A [`RunFlags`] word updated with atomic bit operations.
#[derive(Debug, Default)]
pub struct AtomicRunFlags(AtomicU32);

impl AtomicRunFlags {
    pub fn new(flags: RunFlags) -> Self {
        AtomicRunFlags(AtomicU32::new(flags.bits()))
    }

    pub fn load(&self) -> RunFlags {
        RunFlags::from_bits_retain(self.0.load(Ordering::Acquire))
    }

    /// Sets `flags`, returning the previous word.
    pub fn insert(&self, flags: RunFlags) -> RunFlags {
        RunFlags::from_bits_retain(self.0.fetch_or(flags.bits(), Ordering::AcqRel))
    }

    /// Clears `flags`, returning the previous word.
    pub fn remove(&self, flags: RunFlags) -> RunFlags {
        RunFlags::from_bits_retain(self.0.fetch_and(!flags.bits(), Ordering::AcqRel))
    }

    pub fn contains(&self, flags: RunFlags) -> bool {
        self.load().contains(flags)
    }
}
