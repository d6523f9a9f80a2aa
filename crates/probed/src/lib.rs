//! Session and job-execution core of a remote diagnostic console.
//!
//! Clients connect over TCP or a Unix socket, type commands one line at a
//! time and receive their output as plain text followed by a prompt. Each
//! line runs as a *job*: the command's action writes into the job's output
//! channel through a [`Sender`], and the [`CommandHandler`] drains that
//! channel to the client, polling at a fixed interval while the action is
//! slower than the socket.
//!
//! A session runs at most one job at a time. Lines arriving while a job is
//! being drained are dropped, a `quit` command closes the session, and a
//! `shutdown` command unbinds the whole console.
//!
//! [`run_server`] wires everything together from configuration loaded via
//! [`probe_config`].

mod bootstrap;
pub mod command;
pub mod handler;
pub mod job;
mod latch;
pub mod server;
pub mod session;
mod telemetry;
pub mod transport;

pub use bootstrap::{
    BootstrapError, ConfigLoader, StaticConfigLoader, SystemConfigLoader, resolve_charset,
};
pub use command::{
    Action, ActionContext, ActionError, BuiltinCommands, Command, CommandKind, CommandParser,
    PrepareError, ProcessHandle, Sender,
};
pub use handler::{CommandHandler, ExecuteError, Execution, HandlerSettings};
pub use job::{JobError, JobId, JobReader, JobRegistry, JobWriter, ReadOutcome};
pub use server::{
    Console, RunningConsole, ServerControl, ServerError, ServerLifecycle, ShutdownError,
    ShutdownSignal, SystemShutdownSignal, run_server, run_server_with,
};
pub use session::{Session, SessionId, SessionManager};
pub use telemetry::{TelemetryError, TelemetryHandle, initialise as initialise_telemetry};
pub use transport::{Transport, TransportFault};

#[cfg(test)]
mod tests;
