//! Shared doubles for the crate's test suites.

use std::io;
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::thread;
use std::time::{Duration, Instant};

use mockall::mock;

use crate::command::{ActionContext, ActionError, Command, CommandParser, PrepareError, Sender};
use crate::server::{ServerControl, ShutdownError, ShutdownSignal};
use crate::transport::Transport;

mock! {
    pub Parser {}
    impl CommandParser for Parser {
        fn parse(&self, line: &str) -> Result<Command, PrepareError>;
    }
}

mock! {
    pub Server {}
    impl ServerControl for Server {
        fn unbind(&self);
    }
}

#[derive(Debug, Default)]
struct LogState {
    bytes: Vec<u8>,
    closes: usize,
    fail_writes: bool,
    stalls: usize,
}

/// Observer side of a [`RecordingTransport`].
#[derive(Debug, Clone, Default)]
pub(crate) struct TransportLog {
    shared: Arc<(Mutex<LogState>, Condvar)>,
}

impl TransportLog {
    fn lock(&self) -> MutexGuard<'_, LogState> {
        self.shared.0.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn bytes(&self) -> Vec<u8> {
        self.lock().bytes.clone()
    }

    pub(crate) fn text(&self) -> String {
        String::from_utf8_lossy(&self.lock().bytes).into_owned()
    }

    pub(crate) fn close_count(&self) -> usize {
        self.lock().closes
    }

    /// Makes every later write fail as if the peer reset the connection.
    pub(crate) fn fail_writes(&self) {
        self.lock().fail_writes = true;
    }

    /// Makes the next `count` writes report `WouldBlock`.
    pub(crate) fn stall_writes(&self, count: usize) {
        self.lock().stalls = count;
    }

    /// Waits until the recorded text ends with `suffix`.
    pub(crate) fn wait_for_suffix(&self, suffix: &str, timeout: Duration) -> bool {
        let guard = self.lock();
        let (guard, _) = self
            .shared
            .1
            .wait_timeout_while(guard, timeout, |state| {
                !String::from_utf8_lossy(&state.bytes).ends_with(suffix)
            })
            .unwrap_or_else(PoisonError::into_inner);
        String::from_utf8_lossy(&guard.bytes).ends_with(suffix)
    }
}

/// In-memory transport that records every byte written to it.
#[derive(Debug)]
pub(crate) struct RecordingTransport {
    log: TransportLog,
}

impl RecordingTransport {
    pub(crate) fn new() -> (Self, TransportLog) {
        let log = TransportLog::default();
        (Self { log: log.clone() }, log)
    }
}

impl Transport for RecordingTransport {
    fn write(&mut self, bytes: &[u8]) -> io::Result<usize> {
        let mut state = self.log.lock();
        if state.fail_writes {
            return Err(io::Error::from(io::ErrorKind::ConnectionReset));
        }
        if state.stalls > 0 {
            state.stalls -= 1;
            return Err(io::Error::from(io::ErrorKind::WouldBlock));
        }
        // Accept at most three bytes per call to exercise partial writes.
        let accepted = bytes.len().min(3);
        state.bytes.extend_from_slice(&bytes[..accepted]);
        self.log.shared.1.notify_all();
        Ok(accepted)
    }

    fn close(&mut self) -> io::Result<()> {
        self.log.lock().closes += 1;
        self.log.shared.1.notify_all();
        Ok(())
    }
}

/// Timestamps recorded by scripted commands.
#[derive(Debug, Clone, Default)]
pub(crate) struct Probe {
    final_sent: Arc<Mutex<Option<Instant>>>,
}

impl Probe {
    pub(crate) fn final_sent(&self) -> Option<Instant> {
        *self.final_sent.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn mark_final(&self) {
        *self.final_sent.lock().unwrap_or_else(PoisonError::into_inner) = Some(Instant::now());
    }
}

/// Vocabulary understood by the scripted parser used in handler tests.
pub(crate) fn scripted_command(line: &str, probe: &Probe) -> Result<Command, PrepareError> {
    let name = line.split_whitespace().next().unwrap_or_default();
    match name {
        "echo" => Ok(Command::new(name, echo)),
        "quit" => Ok(Command::quit(name, bye)),
        "shutdown" => Ok(Command::shutdown(name, bye)),
        "broken" => Err(PrepareError::initialization(name)),
        "bad" => Err(PrepareError::preparation(name, "invalid option")),
        "fail" => Ok(Command::new(name, fail)),
        "panic" => Ok(Command::new(name, explode)),
        "hang" => Ok(Command::new(name, hang)),
        "flood" => Ok(Command::new(name, flood)),
        "tag" => Ok(Command::new(name, tag)),
        "slow" => {
            let probe = probe.clone();
            Ok(Command::new(
                name,
                move |_context: &ActionContext, sender: Arc<dyn Sender>| -> Result<(), ActionError> {
                    let probe = probe.clone();
                    thread::spawn(move || {
                        sender.send(false, "x");
                        thread::sleep(Duration::from_millis(150));
                        sender.send(true, "y");
                        probe.mark_final();
                    });
                    Ok(())
                },
            ))
        }
        other => Err(PrepareError::not_found(other)),
    }
}

fn echo(_context: &ActionContext, sender: Arc<dyn Sender>) -> Result<(), ActionError> {
    sender.send(false, "a");
    sender.send(false, "b");
    sender.send(true, "c");
    Ok(())
}

fn bye(_context: &ActionContext, sender: Arc<dyn Sender>) -> Result<(), ActionError> {
    sender.send(true, "Bye!");
    Ok(())
}

fn fail(_context: &ActionContext, _sender: Arc<dyn Sender>) -> Result<(), ActionError> {
    Err(ActionError::failed("boom"))
}

fn explode(_context: &ActionContext, _sender: Arc<dyn Sender>) -> Result<(), ActionError> {
    panic!("kaboom");
}

fn hang(_context: &ActionContext, _sender: Arc<dyn Sender>) -> Result<(), ActionError> {
    Ok(())
}

fn flood(_context: &ActionContext, sender: Arc<dyn Sender>) -> Result<(), ActionError> {
    sender.send(false, "abcd");
    sender.send(false, "efghijklmn");
    Ok(())
}

/// Emits chunks tagged with the session id from a background producer.
fn tag(context: &ActionContext, sender: Arc<dyn Sender>) -> Result<(), ActionError> {
    let session_id = context.session_id();
    thread::spawn(move || {
        for index in 0..5 {
            sender.send(false, &format!("<s{session_id}:{index}>"));
            thread::sleep(Duration::from_millis(20));
        }
        sender.send(true, "");
    });
    Ok(())
}

/// Shutdown signal released by the test.
#[derive(Debug, Clone, Default)]
pub(crate) struct ManualShutdown {
    inner: Arc<(Mutex<bool>, Condvar)>,
}

impl ManualShutdown {
    pub(crate) fn trigger(&self) {
        let (lock, signal) = &*self.inner;
        *lock.lock().unwrap_or_else(PoisonError::into_inner) = true;
        signal.notify_all();
    }
}

impl ShutdownSignal for ManualShutdown {
    fn wait(&self) -> Result<(), ShutdownError> {
        let (lock, signal) = &*self.inner;
        let mut triggered = lock.lock().unwrap_or_else(PoisonError::into_inner);
        while !*triggered {
            triggered = signal
                .wait(triggered)
                .unwrap_or_else(PoisonError::into_inner);
        }
        Ok(())
    }
}

/// Shutdown signal whose installation always fails.
#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct BrokenShutdown;

impl ShutdownSignal for BrokenShutdown {
    fn wait(&self) -> Result<(), ShutdownError> {
        Err(ShutdownError::Install {
            source: io::Error::other("signals unavailable"),
        })
    }
}
