//! One-shot completion latch the driving thread blocks on.

use parking_lot::{Condvar, Mutex};

#[derive(Debug, Default)]
pub struct Latch {
    released: Mutex<bool>,
    cond: Condvar,
}

impl Latch {
    pub fn new() -> Self {
        Self::default()
    }

    /// Releases every current and future waiter.
    pub fn release(&self) {
        let mut released = self.released.lock();
        *released = true;
        self.cond.notify_all();
    }

    pub fn wait(&self) {
        let mut released = self.released.lock();
        while !*released {
            self.cond.wait(&mut released);
        }
    }

    pub fn is_released(&self) -> bool {
        *self.released.lock()
    }
}
