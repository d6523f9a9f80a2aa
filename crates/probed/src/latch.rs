//! A resettable flag that sleeping threads can wait on.

use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

/// Boolean flag paired with a condition variable so a raise wakes waiters
/// immediately instead of at the end of their sleep.
#[derive(Debug, Default)]
pub(crate) struct Latch {
    raised: Mutex<bool>,
    signal: Condvar,
}

impl Latch {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn raise(&self) {
        let mut raised = self.lock();
        *raised = true;
        self.signal.notify_all();
    }

    pub(crate) fn clear(&self) {
        *self.lock() = false;
    }

    pub(crate) fn is_raised(&self) -> bool {
        *self.lock()
    }

    /// Sleeps for up to `timeout`. Returns `true` if the latch was raised
    /// before or during the wait.
    pub(crate) fn wait_timeout(&self, timeout: Duration) -> bool {
        let guard = self.lock();
        let (raised, _) = self
            .signal
            .wait_timeout_while(guard, timeout, |raised| !*raised)
            .unwrap_or_else(PoisonError::into_inner);
        *raised
    }

    fn lock(&self) -> MutexGuard<'_, bool> {
        self.raised.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::thread;
    use std::time::Instant;

    use super::*;

    #[test]
    fn wait_runs_to_timeout_when_not_raised() {
        let latch = Latch::new();
        let started = Instant::now();
        assert!(!latch.wait_timeout(Duration::from_millis(30)));
        assert!(started.elapsed() >= Duration::from_millis(30));
    }

    #[test]
    fn raise_wakes_a_waiter_early() {
        let latch = Arc::new(Latch::new());
        let raiser = Arc::clone(&latch);
        let handle = thread::spawn(move || {
            thread::sleep(Duration::from_millis(20));
            raiser.raise();
        });

        let started = Instant::now();
        assert!(latch.wait_timeout(Duration::from_secs(5)));
        assert!(started.elapsed() < Duration::from_secs(2));
        handle.join().expect("join raiser");
    }

    #[test]
    fn clear_resets_the_flag() {
        let latch = Latch::new();
        latch.raise();
        assert!(latch.is_raised());
        latch.clear();
        assert!(!latch.is_raised());
    }
}
