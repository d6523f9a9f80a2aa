use thiserror::Error;

use crate::bootstrap::BootstrapError;
use crate::transport::ListenerError;

use super::shutdown::ShutdownError;

/// Errors surfaced while running the console.
#[derive(Debug, Error)]
pub enum ServerError {
    #[error("failed to bootstrap console: {source}")]
    Bootstrap {
        #[source]
        source: BootstrapError,
    },
    #[error("console listener failed: {source}")]
    Listener {
        #[source]
        source: ListenerError,
    },
    #[error("failed to spawn {name} thread: {source}")]
    Spawn {
        name: &'static str,
        #[source]
        source: std::io::Error,
    },
    #[error("shutdown signal failed: {source}")]
    Shutdown {
        #[source]
        source: ShutdownError,
    },
}

impl From<BootstrapError> for ServerError {
    fn from(source: BootstrapError) -> Self {
        Self::Bootstrap { source }
    }
}

impl From<ListenerError> for ServerError {
    fn from(source: ListenerError) -> Self {
        Self::Listener { source }
    }
}

impl From<ShutdownError> for ServerError {
    fn from(source: ShutdownError) -> Self {
        Self::Shutdown { source }
    }
}
