//! Runs the console as a process.

use std::sync::{Arc, mpsc};
use std::thread;

use tracing::{info, warn};

use super::{Console, SERVER_TARGET, ServerControl, ServerError, ShutdownSignal, SystemShutdownSignal};
use crate::bootstrap::{BootstrapError, ConfigLoader, SystemConfigLoader};
use crate::command::{BuiltinCommands, CommandParser, ProcessHandle};
use crate::telemetry;

/// Runs the console with the production collaborators until a signal or a
/// `shutdown` command stops it.
///
/// # Errors
///
/// [`ServerError`] when bootstrap fails or the console stops abnormally.
pub fn run_server() -> Result<(), ServerError> {
    run_server_with(
        &SystemConfigLoader,
        Arc::new(BuiltinCommands),
        SystemShutdownSignal,
    )
}

/// Runs the console with injected collaborators.
///
/// # Errors
///
/// See [`run_server`].
pub fn run_server_with<S>(
    loader: &dyn ConfigLoader,
    parser: Arc<dyn CommandParser>,
    shutdown: S,
) -> Result<(), ServerError>
where
    S: ShutdownSignal + 'static,
{
    let config = loader
        .load()
        .map_err(|source| BootstrapError::Configuration { source })?;
    telemetry::initialise(&config).map_err(|source| BootstrapError::Telemetry { source })?;
    info!(target: SERVER_TARGET, endpoint = %config.listen(), "starting console");

    let console = Console::bind(&config, parser, Arc::new(ProcessHandle::current()))?;
    let running = console.start()?;

    let lifecycle = running.lifecycle();
    let (signal_tx, signal_rx) = mpsc::channel();
    thread::Builder::new()
        .name("probe-signals".to_owned())
        .spawn(move || {
            let result = shutdown.wait();
            if let Err(error) = &result {
                warn!(target: SERVER_TARGET, error = %error, "shutdown signal failed");
            }
            // The receiver may already be gone after a `shutdown` command.
            signal_tx.send(result).ok();
            lifecycle.unbind();
        })
        .map_err(|source| ServerError::Spawn {
            name: "signal",
            source,
        })?;

    running.wait()?;
    if let Ok(Err(error)) = signal_rx.try_recv() {
        return Err(error.into());
    }
    info!(target: SERVER_TARGET, "shutdown sequence completed");
    Ok(())
}
