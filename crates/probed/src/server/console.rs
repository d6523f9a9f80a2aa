use std::net::SocketAddr;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use encoding_rs::Encoding;
use tracing::{info, warn};

use probe_config::{Config, SocketEndpoint};

use super::{REAP_INTERVAL, SERVER_TARGET, ServerControl, ServerError, ServerLifecycle};
use crate::bootstrap::{self, BootstrapError};
use crate::command::{CommandParser, ProcessHandle};
use crate::handler::{CommandHandler, HandlerSettings};
use crate::job::JobRegistry;
use crate::session::SessionManager;
use crate::transport::{ConsoleConnectionHandler, ListenerHandle, SocketListener};

/// A console bound to its endpoint but not yet accepting connections.
pub struct Console {
    endpoint: SocketEndpoint,
    listener: SocketListener,
    sessions: Arc<SessionManager>,
    jobs: Arc<JobRegistry>,
    handler: Arc<CommandHandler>,
    lifecycle: Arc<ServerLifecycle>,
    charset: &'static Encoding,
    max_line_bytes: usize,
    session_timeout: Option<Duration>,
}

impl Console {
    /// Resolves the charset, prepares the endpoint and binds the listener.
    ///
    /// # Errors
    ///
    /// [`BootstrapError`] for an unknown charset, an endpoint that cannot be
    /// prepared, or a failed bind.
    pub fn bind(
        config: &Config,
        parser: Arc<dyn CommandParser>,
        process: Arc<ProcessHandle>,
    ) -> Result<Self, BootstrapError> {
        let charset = bootstrap::resolve_charset(config.charset())?;
        config
            .listen()
            .prepare_filesystem()
            .map_err(|source| BootstrapError::Socket { source })?;
        let listener = SocketListener::bind(config.listen())
            .map_err(|source| BootstrapError::Listener { source })?;

        let lifecycle = Arc::new(ServerLifecycle::new());
        let control: Arc<dyn ServerControl> = lifecycle.clone();
        let jobs = Arc::new(JobRegistry::new(config.max_jobs, config.job_buffer_chars));
        let handler = Arc::new(CommandHandler::new(
            parser,
            Arc::clone(&jobs),
            control,
            process,
            HandlerSettings::from_config(config),
        ));
        Ok(Self {
            endpoint: config.listen().clone(),
            listener,
            sessions: Arc::new(SessionManager::new()),
            jobs,
            handler,
            lifecycle,
            charset,
            max_line_bytes: config.max_line_bytes,
            session_timeout: config.session_timeout(),
        })
    }

    /// Address of a TCP listener; `None` for Unix sockets.
    #[must_use]
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.listener.local_addr()
    }

    /// Starts accepting connections and, when configured, reaping idle
    /// sessions.
    ///
    /// # Errors
    ///
    /// [`ServerError`] when the listener or reaper cannot start.
    pub fn start(self) -> Result<RunningConsole, ServerError> {
        let local_addr = self.local_addr();
        let connections = Arc::new(ConsoleConnectionHandler::new(
            Arc::clone(&self.sessions),
            Arc::clone(&self.handler),
            Arc::clone(&self.lifecycle),
            self.charset,
            self.max_line_bytes,
        ));
        let listener = self
            .listener
            .start(connections, Arc::clone(&self.lifecycle))?;

        let reaper = match self.session_timeout {
            Some(timeout) => Some(spawn_reaper(
                Arc::clone(&self.sessions),
                Arc::clone(&self.lifecycle),
                timeout,
            )?),
            None => None,
        };

        info!(
            target: SERVER_TARGET,
            endpoint = %self.endpoint,
            charset = self.charset.name(),
            "console started"
        );
        Ok(RunningConsole {
            local_addr,
            sessions: self.sessions,
            jobs: self.jobs,
            lifecycle: self.lifecycle,
            listener,
            reaper,
        })
    }
}

fn spawn_reaper(
    sessions: Arc<SessionManager>,
    lifecycle: Arc<ServerLifecycle>,
    timeout: Duration,
) -> Result<thread::JoinHandle<()>, ServerError> {
    thread::Builder::new()
        .name("probe-reaper".to_owned())
        .spawn(move || {
            while !lifecycle.wait_timeout(REAP_INTERVAL) {
                sessions.reap_idle(timeout);
            }
        })
        .map_err(|source| ServerError::Spawn {
            name: "reaper",
            source,
        })
}

/// A console accepting connections.
pub struct RunningConsole {
    local_addr: Option<SocketAddr>,
    sessions: Arc<SessionManager>,
    jobs: Arc<JobRegistry>,
    lifecycle: Arc<ServerLifecycle>,
    listener: ListenerHandle,
    reaper: Option<thread::JoinHandle<()>>,
}

impl RunningConsole {
    #[must_use]
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.local_addr
    }

    #[must_use]
    pub fn lifecycle(&self) -> Arc<ServerLifecycle> {
        Arc::clone(&self.lifecycle)
    }

    #[must_use]
    pub fn sessions(&self) -> &Arc<SessionManager> {
        &self.sessions
    }

    #[must_use]
    pub fn jobs(&self) -> &Arc<JobRegistry> {
        &self.jobs
    }

    /// Unbinds the console. Returns immediately; use [`RunningConsole::wait`]
    /// to join.
    pub fn shutdown(&self) {
        self.listener.shutdown();
    }

    /// Blocks until the console is unbound, then closes every session.
    ///
    /// # Errors
    ///
    /// [`ServerError::Listener`] if the accept loop panicked.
    pub fn wait(mut self) -> Result<(), ServerError> {
        self.lifecycle.wait();
        let listener = self.listener.join();
        if let Some(reaper) = self.reaper.take() {
            if reaper.join().is_err() {
                warn!(target: SERVER_TARGET, "session reaper panicked");
            }
        }
        self.sessions.destroy_all();
        info!(target: SERVER_TARGET, "console stopped");
        listener.map_err(ServerError::from)
    }
}
