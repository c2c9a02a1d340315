//! Condition-based timed waits for pool and queue coordination
//!
//! A [`Waiter`] pairs a condition variable with a mutex that is held only
//! across the timed wait itself; the structures being waited on stay
//! lock-free. Wakeups are advisory: a notification may land before the
//! waiter parks, so callers always re-poll the underlying structure under a
//! deadline rather than trusting a single wakeup.

use std::sync::{Condvar, Mutex};
use std::time::Duration;

/// A condvar/mutex pair for bounded waits on lock-free structures.
#[derive(Debug, Default)]
pub struct Waiter {
    lock: Mutex<()>,
    cond: Condvar,
}

impl Waiter {
    /// Create a new waiter
    pub fn new() -> Self {
        Self::default()
    }

    /// Block for up to `timeout`, returning `true` if woken by a
    /// notification and `false` on timeout.
    pub fn wait_for(&self, timeout: Duration) -> bool {
        if timeout.is_zero() {
            return false;
        }
        let guard = self.lock.lock().unwrap();
        let (_guard, result) = self.cond.wait_timeout(guard, timeout).unwrap();
        !result.timed_out()
    }

    /// Wake one waiting thread
    pub fn notify_one(&self) {
        self.cond.notify_one();
    }

    /// Wake all waiting threads
    pub fn notify_all(&self) {
        self.cond.notify_all();
    }
}
