//! Console assembly and lifecycle.

mod console;
mod errors;
pub(crate) mod launch;
mod lifecycle;
pub(crate) mod shutdown;

use std::time::Duration;

pub use console::{Console, RunningConsole};
pub use errors::ServerError;
pub use launch::{run_server, run_server_with};
pub use lifecycle::ServerLifecycle;
pub use shutdown::{ShutdownError, ShutdownSignal, SystemShutdownSignal};

pub(crate) const SERVER_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::server");
pub(crate) const REAP_INTERVAL: Duration = Duration::from_secs(1);

/// Server-wide controls a conversation may trigger.
pub trait ServerControl: Send + Sync {
    /// Stops accepting connections and closes every session.
    fn unbind(&self);
}
