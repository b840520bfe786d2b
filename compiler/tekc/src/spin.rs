//! A test-and-test-and-set spinlock for the scheduler's job lists.
//!
//! List critical sections are a handful of loads and stores, so waiting
//! threads spin with [`Backoff`] instead of parking.

use std::sync::atomic::{AtomicBool, Ordering};

use crossbeam::utils::Backoff;
use parking_lot::lock_api::{self, GuardSend, RawMutex};

pub struct RawSpinLock {
    locked: AtomicBool,
}

// SAFETY: `lock` only returns after swapping `locked` from false to true
// with acquire ordering, and `unlock` stores false with release ordering,
// so at most one holder exists and its writes are visible to the next.
#[allow(unsafe_code)]
unsafe impl RawMutex for RawSpinLock {
    #[allow(clippy::declare_interior_mutable_const)]
    const INIT: RawSpinLock = RawSpinLock {
        locked: AtomicBool::new(false),
    };

    type GuardMarker = GuardSend;

    fn lock(&self) {
        let backoff = Backoff::new();
        while !self.try_lock() {
            while self.locked.load(Ordering::Relaxed) {
                backoff.snooze();
            }
        }
    }

    fn try_lock(&self) -> bool {
        self.locked
            .compare_exchange_weak(false, true, Ordering::Acquire, Ordering::Relaxed)
            .is_ok()
    }

    #[allow(unsafe_code)]
    unsafe fn unlock(&self) {
        self.locked.store(false, Ordering::Release);
    }

    fn is_locked(&self) -> bool {
        self.locked.load(Ordering::Relaxed)
    }
}

pub type SpinMutex<T> = lock_api::Mutex<RawSpinLock, T>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn test_try_lock_fails_while_held() {
        let lock = SpinMutex::new(0u32);
        let guard = lock.lock();
        assert!(lock.try_lock().is_none());
        drop(guard);
        assert!(lock.try_lock().is_some());
    }

    #[test]
    fn test_increments_are_not_lost() {
        let lock = SpinMutex::new(0u64);
        thread::scope(|s| {
            for _ in 0..8 {
                s.spawn(|| {
                    for _ in 0..10_000 {
                        *lock.lock() += 1;
                    }
                });
            }
        });
        assert_eq!(lock.into_inner(), 80_000);
    }
}
