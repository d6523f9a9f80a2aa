//! Configuration loading and the checks run before the console binds.

use std::sync::Arc;

use encoding_rs::Encoding;
use ortho_config::{OrthoConfig, OrthoError};
use thiserror::Error;

use probe_config::{Config, SocketPreparationError};

use crate::telemetry::TelemetryError;
use crate::transport::ListenerError;

/// Source of the console configuration.
pub trait ConfigLoader: Send + Sync {
    /// Loads the console configuration.
    ///
    /// # Errors
    ///
    /// Returns the loader's error when any configuration layer is invalid.
    fn load(&self) -> Result<Config, Arc<OrthoError>>;
}

/// Loader that reads defaults, file, environment and command line.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemConfigLoader;

impl ConfigLoader for SystemConfigLoader {
    fn load(&self) -> Result<Config, Arc<OrthoError>> {
        Config::load()
    }
}

/// Loader returning a fixed configuration.
#[derive(Debug, Clone)]
pub struct StaticConfigLoader {
    config: Config,
}

impl StaticConfigLoader {
    #[must_use]
    pub fn new(config: Config) -> Self {
        Self { config }
    }
}

impl ConfigLoader for StaticConfigLoader {
    fn load(&self) -> Result<Config, Arc<OrthoError>> {
        Ok(self.config.clone())
    }
}

/// Errors surfaced before the console starts accepting connections.
#[derive(Debug, Error)]
pub enum BootstrapError {
    /// Configuration failed to load.
    #[error("failed to load configuration: {source}")]
    Configuration {
        #[source]
        source: Arc<OrthoError>,
    },
    /// Telemetry initialisation failed.
    #[error("failed to initialise telemetry: {source}")]
    Telemetry {
        #[source]
        source: TelemetryError,
    },
    /// The configured charset label is not a known encoding.
    #[error("unknown charset '{label}'")]
    Charset { label: String },
    /// Preparing the socket directory failed.
    #[error("failed to prepare console socket: {source}")]
    Socket {
        #[source]
        source: SocketPreparationError,
    },
    /// Binding the endpoint failed.
    #[error("failed to bind console endpoint: {source}")]
    Listener {
        #[source]
        source: ListenerError,
    },
}

/// Looks up a WHATWG encoding label such as `UTF-8` or `GBK`.
///
/// # Errors
///
/// [`BootstrapError::Charset`] for an unknown label.
pub fn resolve_charset(label: &str) -> Result<&'static Encoding, BootstrapError> {
    Encoding::for_label(label.trim().as_bytes()).ok_or_else(|| BootstrapError::Charset {
        label: label.to_owned(),
    })
}
