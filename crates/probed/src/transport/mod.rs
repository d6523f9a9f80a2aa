//! Socket listener and per-connection plumbing.
//!
//! The listener binds the configured endpoint and accepts connections on a
//! background thread until the console is unbound. Each connection becomes a
//! session whose input lines are handed to the command handler.

mod connection;
mod errors;
mod listener;
mod stream;

pub use self::connection::ConsoleConnectionHandler;
pub use self::errors::{ListenerError, TransportFault};
pub(crate) use self::listener::{ListenerHandle, SocketListener};
pub(crate) use self::stream::ConnectionStream;
pub use self::stream::Transport;

pub(crate) const TRANSPORT_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::transport");

/// Handles accepted socket connections.
pub(crate) trait ConnectionHandler: Send + Sync + 'static {
    /// Handles a single connection until it closes.
    fn handle(&self, stream: ConnectionStream);
}
