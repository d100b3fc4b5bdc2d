//! Single-use completion latch
//!
//! Some references are acquired when an operation starts and must be
//! released at exactly one of several racing completion sites (engine
//! failure callback, engine shutdown, explicit close). The latch holds
//! the reference; the first caller of [`CompletionLatch::release`] wins
//! it and every later caller gets `None`.

use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};

pub struct CompletionLatch<T> {
    fired: AtomicBool,
    slot: Mutex<Option<T>>,
}

impl<T> CompletionLatch<T> {
    /// Arm a latch holding `value`
    pub fn new(value: T) -> Self {
        Self {
            fired: AtomicBool::new(false),
            slot: Mutex::new(Some(value)),
        }
    }

    /// Release the held value; only the first call returns `Some`
    pub fn release(&self) -> Option<T> {
        if self
            .fired
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return None;
        }
        self.slot.lock().take()
    }

    /// Check whether the latch has fired
    pub fn is_released(&self) -> bool {
        self.fired.load(Ordering::SeqCst)
    }
}

impl<T: Clone> CompletionLatch<T> {
    /// Clone the held value while the latch is still armed
    ///
    /// A clone taken concurrently with `release` is an independent
    /// reference; the caller owns it.
    pub fn get(&self) -> Option<T> {
        if self.is_released() {
            return None;
        }
        self.slot.lock().clone()
    }
}

impl<T> std::fmt::Debug for CompletionLatch<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CompletionLatch")
            .field("released", &self.is_released())
            .finish()
    }
}
