//! Single-producer/single-consumer text pipe backing a job.

use std::collections::VecDeque;
use std::io;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Delivered after the buffered output of a job that overflowed its channel.
pub(crate) const TRUNCATION_NOTICE: &str = "\n... output truncated\n";

/// Result of a single read from a job's output channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReadOutcome {
    /// Buffered text, at most the requested number of characters.
    Data(String),
    /// Nothing buffered yet; the producer has not finished.
    Empty,
    /// Nothing buffered and the producer marked the job finished.
    Finished,
    /// The job was killed; nothing more will ever be readable.
    Closed,
}

#[derive(Debug, Default)]
struct ChannelState {
    chunks: VecDeque<String>,
    buffered_chars: usize,
    finished: bool,
    closed: bool,
    truncated: bool,
    notice_delivered: bool,
}

#[derive(Debug)]
pub(crate) struct JobChannel {
    state: Mutex<ChannelState>,
    capacity_chars: usize,
}

impl JobChannel {
    pub(crate) fn new(capacity_chars: usize) -> Self {
        Self {
            state: Mutex::new(ChannelState::default()),
            capacity_chars,
        }
    }

    fn push(&self, text: &str) -> io::Result<()> {
        let mut state = self.lock();
        if state.closed {
            return Err(closed_error());
        }
        let chars = text.chars().count();
        if state.buffered_chars + chars > self.capacity_chars {
            state.truncated = true;
            return Err(io::Error::other(format!(
                "job output buffer full ({} characters)",
                self.capacity_chars
            )));
        }
        state.buffered_chars += chars;
        state.chunks.push_back(text.to_owned());
        Ok(())
    }

    fn ensure_open(&self) -> io::Result<()> {
        if self.lock().closed {
            Err(closed_error())
        } else {
            Ok(())
        }
    }

    fn finish(&self) {
        self.lock().finished = true;
    }

    fn read(&self, max_chars: usize) -> ReadOutcome {
        let mut state = self.lock();
        if state.closed {
            return ReadOutcome::Closed;
        }
        if state.chunks.is_empty() {
            if !state.finished {
                return ReadOutcome::Empty;
            }
            if state.truncated && !state.notice_delivered {
                state.notice_delivered = true;
                return ReadOutcome::Data(TRUNCATION_NOTICE.to_owned());
            }
            return ReadOutcome::Finished;
        }
        let text = take_chars(&mut state.chunks, max_chars.max(1));
        state.buffered_chars -= text.chars().count();
        ReadOutcome::Data(text)
    }

    /// Closes the channel and drops anything still unread.
    pub(crate) fn close(&self) {
        let mut state = self.lock();
        state.closed = true;
        state.chunks.clear();
        state.buffered_chars = 0;
    }

    fn lock(&self) -> MutexGuard<'_, ChannelState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn closed_error() -> io::Error {
    io::Error::new(io::ErrorKind::BrokenPipe, "job output channel closed")
}

/// Pops up to `max_chars` characters off the front of the queue, splitting a
/// chunk on a character boundary when it does not fit whole.
fn take_chars(chunks: &mut VecDeque<String>, max_chars: usize) -> String {
    let mut taken = String::new();
    let mut remaining = max_chars;
    while remaining > 0 {
        let Some(front) = chunks.front_mut() else {
            break;
        };
        match front.char_indices().nth(remaining) {
            Some((split, _)) => {
                taken.extend(front.drain(..split));
                remaining = 0;
            }
            None => {
                remaining -= front.chars().count();
                taken.push_str(front);
                chunks.pop_front();
            }
        }
    }
    taken
}

/// Write end of a job's output channel, handed to the producer.
#[derive(Debug, Clone)]
pub struct JobWriter {
    channel: Arc<JobChannel>,
}

impl JobWriter {
    pub(crate) fn new(channel: Arc<JobChannel>) -> Self {
        Self { channel }
    }

    /// Appends text to the channel.
    ///
    /// # Errors
    ///
    /// Fails with `BrokenPipe` once the job was killed, or when the write
    /// would exceed the channel's capacity.
    pub fn write(&self, text: &str) -> io::Result<()> {
        if text.is_empty() {
            return self.channel.ensure_open();
        }
        self.channel.push(text)
    }

    /// Confirms everything written so far is visible to the reader.
    ///
    /// # Errors
    ///
    /// Fails with `BrokenPipe` once the job was killed.
    pub fn flush(&self) -> io::Result<()> {
        self.channel.ensure_open()
    }

    /// Marks the job finished: no further output will be written.
    pub fn finish(&self) {
        self.channel.finish();
    }
}

/// Read end of a job's output channel, used by the drain loop.
#[derive(Debug, Clone)]
pub struct JobReader {
    channel: Arc<JobChannel>,
}

impl JobReader {
    pub(crate) fn new(channel: Arc<JobChannel>) -> Self {
        Self { channel }
    }

    /// Reads at most `max_chars` characters.
    ///
    /// `Finished` is only reported once every buffered character has been
    /// read, so output written before the finish mark is never lost. A job
    /// that overflowed its buffer yields one truncation notice first.
    #[must_use]
    pub fn read(&self, max_chars: usize) -> ReadOutcome {
        self.channel.read(max_chars)
    }
}
