//! Commands, the actions behind them, and the context actions run in.
//!
//! The handler never inspects what a command does. It only looks at the
//! command's [`CommandKind`] to decide what happens after the action's output
//! has been drained: redraw the prompt, close the session, or unbind the
//! server.

mod builtins;
mod errors;
mod parser;

use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::job::JobId;
use crate::session::SessionId;

pub use self::builtins::BuiltinCommands;
pub(crate) use self::errors::root_cause_message;
pub use self::errors::{ActionError, PrepareError};
pub use self::parser::CommandParser;

/// What the handler does once a command's output has been drained.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandKind {
    /// Redraw the prompt.
    Ordinary,
    /// Destroy the session.
    Quit,
    /// Unbind the whole server.
    Shutdown,
}

/// Output capability handed to an action.
///
/// Each call appends `message` to the job's output and, when `is_final` is
/// set, a trailing newline. After a final chunk the job counts as finished.
pub trait Sender: Send + Sync {
    fn send(&self, is_final: bool, message: &str);
}

/// The work a command performs.
///
/// Actions run on the conversation thread. An action may return before its
/// output is complete, as long as something keeps the `Sender` and
/// eventually sends a final chunk.
pub trait Action: Send + Sync {
    /// Runs the command.
    ///
    /// # Errors
    ///
    /// Any error is reported to the client as an execution failure and the
    /// job is reclaimed without draining.
    fn run(&self, context: &ActionContext, sender: Arc<dyn Sender>) -> Result<(), ActionError>;
}

impl<F> Action for F
where
    F: Fn(&ActionContext, Arc<dyn Sender>) -> Result<(), ActionError> + Send + Sync,
{
    fn run(&self, context: &ActionContext, sender: Arc<dyn Sender>) -> Result<(), ActionError> {
        self(context, sender)
    }
}

/// A parsed, runnable command.
pub struct Command {
    name: String,
    kind: CommandKind,
    action: Box<dyn Action>,
}

impl fmt::Debug for Command {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("Command")
            .field("name", &self.name)
            .field("kind", &self.kind)
            .finish_non_exhaustive()
    }
}

impl Command {
    /// An ordinary command.
    pub fn new(name: impl Into<String>, action: impl Action + 'static) -> Self {
        Self::with_kind(name, CommandKind::Ordinary, action)
    }

    /// A command that closes the session after its output is drained.
    pub fn quit(name: impl Into<String>, action: impl Action + 'static) -> Self {
        Self::with_kind(name, CommandKind::Quit, action)
    }

    /// A command that unbinds the server after its output is drained.
    pub fn shutdown(name: impl Into<String>, action: impl Action + 'static) -> Self {
        Self::with_kind(name, CommandKind::Shutdown, action)
    }

    pub fn with_kind(
        name: impl Into<String>,
        kind: CommandKind,
        action: impl Action + 'static,
    ) -> Self {
        Self {
            name: name.into(),
            kind,
            action: Box::new(action),
        }
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn kind(&self) -> CommandKind {
        self.kind
    }

    #[must_use]
    pub fn action(&self) -> &dyn Action {
        self.action.as_ref()
    }
}

/// Read-only facts an action may use.
#[derive(Debug, Clone)]
pub struct ActionContext {
    process: Arc<ProcessHandle>,
    session_id: SessionId,
    job_id: JobId,
    charset: &'static str,
}

impl ActionContext {
    pub(crate) fn new(
        process: Arc<ProcessHandle>,
        session_id: SessionId,
        job_id: JobId,
        charset: &'static str,
    ) -> Self {
        Self {
            process,
            session_id,
            job_id,
            charset,
        }
    }

    #[must_use]
    pub fn process(&self) -> &ProcessHandle {
        &self.process
    }

    #[must_use]
    pub fn session_id(&self) -> SessionId {
        self.session_id
    }

    #[must_use]
    pub fn job_id(&self) -> JobId {
        self.job_id
    }

    /// Name of the session's character encoding.
    #[must_use]
    pub fn charset(&self) -> &'static str {
        self.charset
    }
}

/// Handle on the process the console is attached to.
#[derive(Debug, Clone)]
pub struct ProcessHandle {
    pid: u32,
    name: String,
    started: Instant,
}

impl ProcessHandle {
    /// Describes the current process.
    #[must_use]
    pub fn current() -> Self {
        let name = std::env::current_exe()
            .ok()
            .and_then(|path| path.file_name().map(|name| name.to_string_lossy().into_owned()))
            .unwrap_or_else(|| env!("CARGO_PKG_NAME").to_owned());
        Self::new(std::process::id(), name)
    }

    #[must_use]
    pub fn new(pid: u32, name: impl Into<String>) -> Self {
        Self {
            pid,
            name: name.into(),
            started: Instant::now(),
        }
    }

    #[must_use]
    pub fn pid(&self) -> u32 {
        self.pid
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Time since the handle was created.
    #[must_use]
    pub fn uptime(&self) -> Duration {
        self.started.elapsed()
    }
}
