//! Turns input lines into command executions and streams their output.
//!
//! One call to [`CommandHandler::execute_line`] is one conversation: gate on
//! the session's job flag, parse, allocate a job, run the action, drain the
//! job's output to the client, then redraw the prompt, close the session, or
//! unbind the server depending on the command's kind. Every failure is
//! classified and reported before the call returns.

mod drain;
mod errors;
mod sender;

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, warn};

use probe_config::Config;

use crate::command::{
    ActionContext, Command, CommandKind, CommandParser, PrepareError, ProcessHandle, Sender,
    root_cause_message,
};
use crate::job::{JobId, JobRegistry};
use crate::server::ServerControl;
use crate::session::Session;
use crate::transport::TransportFault;

pub use self::errors::ExecuteError;
use self::sender::JobSender;

pub(crate) const HANDLER_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::handler");

/// Tunables for a [`CommandHandler`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HandlerSettings {
    /// Written after every completed conversation and blank line.
    pub prompt: String,
    /// Sleep between reads of a job that has nothing buffered.
    pub drain_interval: Duration,
    /// Characters read from a job per drain iteration.
    pub drain_buffer_chars: usize,
}

impl HandlerSettings {
    #[must_use]
    pub fn from_config(config: &Config) -> Self {
        Self {
            prompt: config.prompt().to_owned(),
            drain_interval: config.drain_interval(),
            drain_buffer_chars: config.drain_buffer_chars,
        }
    }
}

impl Default for HandlerSettings {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}

/// Result of a successful [`CommandHandler::execute`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Execution {
    /// The action ran and its output was drained.
    Completed,
    /// Another line already claimed the session.
    Ignored,
}

/// Runs conversations for every session of a console.
pub struct CommandHandler {
    parser: Arc<dyn CommandParser>,
    jobs: Arc<JobRegistry>,
    server: Arc<dyn ServerControl>,
    process: Arc<ProcessHandle>,
    settings: HandlerSettings,
}

impl CommandHandler {
    #[must_use]
    pub fn new(
        parser: Arc<dyn CommandParser>,
        jobs: Arc<JobRegistry>,
        server: Arc<dyn ServerControl>,
        process: Arc<ProcessHandle>,
        settings: HandlerSettings,
    ) -> Self {
        Self {
            parser,
            jobs,
            server,
            process,
            settings,
        }
    }

    #[must_use]
    pub fn jobs(&self) -> &Arc<JobRegistry> {
        &self.jobs
    }

    #[must_use]
    pub fn settings(&self) -> &HandlerSettings {
        &self.settings
    }

    /// Handles one input line for `session`.
    pub fn execute_line(&self, line: &str, session: &Session) {
        if session.has_job_running() {
            debug!(
                target: HANDLER_TARGET,
                session_id = %session.id(),
                job_id = ?session.current_job_id(),
                "session has a running job; ignoring line"
            );
            return;
        }

        if line.trim().is_empty() {
            debug!(target: HANDLER_TARGET, session_id = %session.id(), "redrawing prompt for blank line");
            self.redraw_prompt(session);
            return;
        }

        let command = match self.parser.parse(line) {
            Ok(command) => command,
            Err(error) => {
                self.report_preparation(session, line, &error);
                return;
            }
        };

        let Some(claim) = SessionClaim::acquire(session) else {
            debug!(
                target: HANDLER_TARGET,
                session_id = %session.id(),
                command = command.name(),
                "another line claimed the session first; ignoring"
            );
            return;
        };
        match self.run(session, &command) {
            Ok(()) => self.complete(session, &command),
            Err(error) => {
                let message = format!("command execute failed, {}\n", root_cause_message(&error));
                warn!(
                    target: HANDLER_TARGET,
                    session_id = %error.session_id(),
                    command = command.name(),
                    error = %error,
                    cause = message.trim_end(),
                    "command execution failed"
                );
                self.write_or_drop(session, &message);
                self.redraw_prompt(session);
            }
        }
        // The next line may only start once this one has fully answered.
        drop(claim);
    }

    /// Runs `command` in a fresh job and drains its output.
    ///
    /// The session's job flag is claimed before the job is allocated and
    /// released, along with the job, on every exit path.
    ///
    /// # Errors
    ///
    /// [`ExecuteError`] when no job can be allocated or the action fails.
    pub fn execute(&self, session: &Session, command: &Command) -> Result<Execution, ExecuteError> {
        let Some(_claim) = SessionClaim::acquire(session) else {
            return Ok(Execution::Ignored);
        };
        self.run(session, command).map(|()| Execution::Completed)
    }

    /// Runs `command` for a session whose job flag the caller holds.
    fn run(&self, session: &Session, command: &Command) -> Result<(), ExecuteError> {
        session.clear_interrupt();

        let job_id = match self.jobs.create_job() {
            Ok(job_id) => job_id,
            Err(source) => {
                return Err(ExecuteError::CreateJob {
                    session_id: session.id(),
                    source,
                });
            }
        };
        session.set_current_job_id(job_id);
        let _cleanup = JobCleanup {
            jobs: &self.jobs,
            job_id,
        };

        let context = ActionContext::new(
            Arc::clone(&self.process),
            session.id(),
            job_id,
            session.charset().name(),
        );
        let sender: Arc<dyn Sender> =
            Arc::new(JobSender::new(Arc::clone(&self.jobs), session.id(), job_id));
        debug!(
            target: HANDLER_TARGET,
            session_id = %session.id(),
            job_id = %job_id,
            command = command.name(),
            "running command"
        );

        let outcome =
            panic::catch_unwind(AssertUnwindSafe(|| command.action().run(&context, sender)));
        match outcome {
            Ok(Ok(())) => {}
            Ok(Err(source)) => {
                return Err(ExecuteError::Action {
                    session_id: session.id(),
                    source,
                });
            }
            Err(payload) => {
                return Err(ExecuteError::Panicked {
                    session_id: session.id(),
                    message: panic_message(payload.as_ref()),
                });
            }
        }

        let exit = drain::drain(session, &self.jobs, job_id, &self.settings);
        debug!(
            target: HANDLER_TARGET,
            session_id = %session.id(),
            job_id = %job_id,
            exit = ?exit,
            "drain finished"
        );
        Ok(())
    }

    fn complete(&self, session: &Session, command: &Command) {
        match command.kind() {
            CommandKind::Quit => session.destroy(),
            CommandKind::Shutdown => {
                info!(
                    target: HANDLER_TARGET,
                    session_id = %session.id(),
                    "shutdown requested by client"
                );
                self.server.unbind();
            }
            CommandKind::Ordinary => {
                debug!(
                    target: HANDLER_TARGET,
                    session_id = %session.id(),
                    "redrawing prompt after command"
                );
                self.redraw_prompt(session);
            }
        }
    }

    fn report_preparation(&self, session: &Session, line: &str, error: &PrepareError) {
        info!(
            target: HANDLER_TARGET,
            session_id = %session.id(),
            command = error.command(),
            "{error}"
        );
        debug!(
            target: HANDLER_TARGET,
            session_id = %session.id(),
            line,
            error = ?error,
            "command preparation failed"
        );
        self.write_or_drop(session, &format!("{error}\n"));
        self.redraw_prompt(session);
    }

    fn redraw_prompt(&self, session: &Session) {
        self.write_or_drop(session, &self.settings.prompt);
    }

    /// Writes outside the drain loop. A broken transport ends the session;
    /// a closed one means it already ended.
    fn write_or_drop(&self, session: &Session, text: &str) {
        match session.write_text(text) {
            Ok(()) => {}
            Err(TransportFault::Closed) => {
                debug!(
                    target: HANDLER_TARGET,
                    session_id = %session.id(),
                    "skipping write to closed transport"
                );
            }
            Err(TransportFault::Broken(error)) => {
                info!(
                    target: HANDLER_TARGET,
                    session_id = %session.id(),
                    error = %error,
                    "network write failed; destroying session"
                );
                session.destroy();
            }
        }
    }
}

/// The session's job flag, held by exactly one conversation at a time.
///
/// Only the holder clears the flag, so a conversation can never release a
/// claim taken by the line after it.
struct SessionClaim<'a> {
    session: &'a Session,
}

impl<'a> SessionClaim<'a> {
    /// Claims the flag, or returns `None` when another line holds it.
    fn acquire(session: &'a Session) -> Option<Self> {
        (!session.mark_job_running(true)).then_some(Self { session })
    }
}

impl Drop for SessionClaim<'_> {
    fn drop(&mut self) {
        self.session.mark_job_running(false);
    }
}

/// Reclaims the job on drop.
struct JobCleanup<'a> {
    jobs: &'a JobRegistry,
    job_id: JobId,
}

impl Drop for JobCleanup<'_> {
    fn drop(&mut self) {
        self.jobs.kill_job(self.job_id);
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_owned()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_owned()
    }
}
