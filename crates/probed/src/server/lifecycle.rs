use std::time::Duration;

use tracing::info;

use super::{SERVER_TARGET, ServerControl};
use crate::latch::Latch;

/// Bound/unbound state shared by the listener, the reaper and every
/// conversation.
#[derive(Debug, Default)]
pub struct ServerLifecycle {
    unbound: Latch,
}

impl ServerLifecycle {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn is_unbound(&self) -> bool {
        self.unbound.is_raised()
    }

    /// Sleeps for up to `timeout`, returning `true` once unbound.
    pub fn wait_timeout(&self, timeout: Duration) -> bool {
        self.unbound.wait_timeout(timeout)
    }

    /// Blocks until the server is unbound.
    pub fn wait(&self) {
        while !self.unbound.wait_timeout(Duration::from_secs(1)) {}
    }
}

impl ServerControl for ServerLifecycle {
    fn unbind(&self) {
        if !self.unbound.is_raised() {
            info!(target: SERVER_TARGET, "unbinding console");
        }
        self.unbound.raise();
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::thread;

    use super::*;

    #[test]
    fn unbind_releases_waiters() {
        let lifecycle = Arc::new(ServerLifecycle::new());
        let waiter = {
            let lifecycle = Arc::clone(&lifecycle);
            thread::spawn(move || lifecycle.wait())
        };
        assert!(!lifecycle.is_unbound());
        lifecycle.unbind();
        lifecycle.unbind();
        waiter.join().expect("join waiter");
        assert!(lifecycle.is_unbound());
    }
}
