//! Per-connection conversation state.
//!
//! A [`Session`] owns the write side of one client connection together with
//! the bookkeeping the command handler needs: whether a job is running, which
//! job that is, and whether the conversation has been torn down. A session is
//! shared between the connection reader, the thread executing the current
//! line, and the idle reaper, so every field is safe to touch from any of
//! them.

mod manager;

use std::fmt;
use std::io;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::thread;
use std::time::{Duration, Instant};

use encoding_rs::Encoding;
use tracing::{debug, warn};

use crate::job::JobId;
use crate::latch::Latch;
use crate::transport::{Transport, TransportFault};

pub use self::manager::SessionManager;

pub(crate) const SESSION_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::session");

const WRITE_RETRY_BACKOFF: Duration = Duration::from_millis(5);

/// Identifier handed out by the [`SessionManager`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SessionId(u64);

impl SessionId {
    pub(crate) const fn new(value: u64) -> Self {
        Self(value)
    }

    /// Raw numeric value.
    #[must_use]
    pub const fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(formatter)
    }
}

/// One client conversation.
pub struct Session {
    id: SessionId,
    transport: Mutex<Option<Box<dyn Transport>>>,
    charset: &'static Encoding,
    job_running: AtomicBool,
    current_job: AtomicU64,
    destroyed: AtomicBool,
    last_active: Mutex<Instant>,
    interrupt: Latch,
}

impl fmt::Debug for Session {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("Session")
            .field("id", &self.id)
            .field("charset", &self.charset.name())
            .field("job_running", &self.has_job_running())
            .field("current_job_id", &self.current_job_id())
            .field("destroyed", &self.is_destroyed())
            .finish_non_exhaustive()
    }
}

impl Session {
    /// Wraps `transport` in a fresh session with no job running.
    #[must_use]
    pub fn new(id: SessionId, transport: Box<dyn Transport>, charset: &'static Encoding) -> Self {
        Self {
            id,
            transport: Mutex::new(Some(transport)),
            charset,
            job_running: AtomicBool::new(false),
            current_job: AtomicU64::new(0),
            destroyed: AtomicBool::new(false),
            last_active: Mutex::new(Instant::now()),
            interrupt: Latch::new(),
        }
    }

    #[must_use]
    pub fn id(&self) -> SessionId {
        self.id
    }

    /// Encoding used for everything written to the client.
    #[must_use]
    pub fn charset(&self) -> &'static Encoding {
        self.charset
    }

    #[must_use]
    pub fn has_job_running(&self) -> bool {
        self.job_running.load(Ordering::SeqCst)
    }

    /// Sets the job-running flag and returns its previous value.
    ///
    /// Callers claiming the session for a new job use the return value to
    /// detect that another line got there first.
    pub fn mark_job_running(&self, running: bool) -> bool {
        self.job_running.swap(running, Ordering::SeqCst)
    }

    pub fn set_current_job_id(&self, id: JobId) {
        self.current_job.store(id.get(), Ordering::SeqCst);
    }

    /// Identifier of the most recently started job, if any.
    #[must_use]
    pub fn current_job_id(&self) -> Option<JobId> {
        match self.current_job.load(Ordering::SeqCst) {
            0 => None,
            raw => Some(JobId::new(raw)),
        }
    }

    /// Records client or job activity for idle reaping.
    pub fn touch(&self) {
        *self.activity() = Instant::now();
    }

    #[must_use]
    pub fn last_active(&self) -> Instant {
        *self.activity()
    }

    #[must_use]
    pub fn idle_for(&self) -> Duration {
        self.last_active().elapsed()
    }

    /// Tears the session down and closes its transport. Idempotent.
    pub fn destroy(&self) {
        if self.destroyed.swap(true, Ordering::SeqCst) {
            return;
        }
        self.interrupt.raise();
        let transport = self.lock_transport().take();
        if let Some(mut transport) = transport
            && let Err(error) = transport.close()
        {
            debug!(
                target: SESSION_TARGET,
                session_id = %self.id,
                error = %error,
                "transport close failed"
            );
        }
        debug!(target: SESSION_TARGET, session_id = %self.id, "session destroyed");
    }

    #[must_use]
    pub fn is_destroyed(&self) -> bool {
        self.destroyed.load(Ordering::SeqCst)
    }

    /// Asks a running drain to stop at its next check, without closing the
    /// session.
    pub fn interrupt(&self) {
        self.interrupt.raise();
    }

    #[must_use]
    pub fn is_interrupted(&self) -> bool {
        self.interrupt.is_raised()
    }

    pub fn clear_interrupt(&self) {
        if !self.is_destroyed() {
            self.interrupt.clear();
        }
    }

    /// Sleeps for up to `interval`. Returns `false` if the session was
    /// interrupted or destroyed meanwhile.
    pub fn pause(&self, interval: Duration) -> bool {
        !self.interrupt.wait_timeout(interval)
    }

    /// Encodes `text` with the session charset and writes it.
    ///
    /// # Errors
    ///
    /// See [`Session::write_all`].
    pub fn write_text(&self, text: &str) -> Result<(), TransportFault> {
        let (bytes, _, lossy) = self.charset.encode(text);
        if lossy {
            debug!(
                target: SESSION_TARGET,
                session_id = %self.id,
                charset = self.charset.name(),
                "text contained characters the charset cannot represent"
            );
        }
        self.write_all(&bytes)
    }

    /// Writes every byte to the transport, retrying transient stalls.
    ///
    /// # Errors
    ///
    /// [`TransportFault::Closed`] once the session is destroyed;
    /// [`TransportFault::Broken`] when the peer is gone.
    pub fn write_all(&self, mut bytes: &[u8]) -> Result<(), TransportFault> {
        let mut guard = self.lock_transport();
        while !bytes.is_empty() {
            if self.is_destroyed() {
                return Err(TransportFault::Closed);
            }
            let Some(transport) = guard.as_mut() else {
                return Err(TransportFault::Closed);
            };
            match transport.write(bytes) {
                Ok(0) => {
                    return Err(TransportFault::Broken(io::Error::from(
                        io::ErrorKind::WriteZero,
                    )));
                }
                Ok(written) => bytes = &bytes[written..],
                Err(error) if is_transient(error.kind()) => {
                    drop(guard);
                    thread::sleep(WRITE_RETRY_BACKOFF);
                    guard = self.lock_transport();
                }
                Err(error) => {
                    warn!(
                        target: SESSION_TARGET,
                        session_id = %self.id,
                        error = %error,
                        "transport write failed"
                    );
                    return Err(TransportFault::Broken(error));
                }
            }
        }
        Ok(())
    }

    fn lock_transport(&self) -> MutexGuard<'_, Option<Box<dyn Transport>>> {
        self.transport.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn activity(&self) -> MutexGuard<'_, Instant> {
        self.last_active.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn is_transient(kind: io::ErrorKind) -> bool {
    matches!(
        kind,
        io::ErrorKind::WouldBlock | io::ErrorKind::Interrupted | io::ErrorKind::TimedOut
    )
}
