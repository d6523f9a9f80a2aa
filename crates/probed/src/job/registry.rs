//! Allocation and lookup of jobs shared by every session.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use thiserror::Error;
use tracing::debug;

use probe_config::{DEFAULT_JOB_BUFFER_CHARS, DEFAULT_MAX_JOBS};

use super::channel::JobChannel;
use super::{JOB_TARGET, JobId, JobReader, JobWriter};

/// Errors raised while allocating a job.
#[derive(Debug, Error)]
pub enum JobError {
    /// Every job slot is in use.
    #[error("job limit of {limit} reached")]
    LimitReached {
        /// Configured maximum number of live jobs.
        limit: usize,
    },
}

/// Registry of live jobs.
///
/// This is the only structure touched by several conversations at once, so
/// every operation takes the internal lock.
#[derive(Debug)]
pub struct JobRegistry {
    jobs: Mutex<HashMap<JobId, Arc<JobChannel>>>,
    next_id: AtomicU64,
    max_jobs: usize,
    buffer_chars: usize,
}

impl Default for JobRegistry {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_JOBS, DEFAULT_JOB_BUFFER_CHARS)
    }
}

impl JobRegistry {
    /// Creates a registry holding at most `max_jobs` jobs, each buffering at
    /// most `buffer_chars` unread characters.
    #[must_use]
    pub fn new(max_jobs: usize, buffer_chars: usize) -> Self {
        Self {
            jobs: Mutex::new(HashMap::new()),
            next_id: AtomicU64::new(1),
            max_jobs,
            buffer_chars,
        }
    }

    /// Allocates a new job with an empty output channel.
    ///
    /// # Errors
    ///
    /// Returns [`JobError::LimitReached`] when the registry is full.
    pub fn create_job(&self) -> Result<JobId, JobError> {
        let mut jobs = self.lock();
        if jobs.len() >= self.max_jobs {
            return Err(JobError::LimitReached {
                limit: self.max_jobs,
            });
        }
        let id = JobId::new(self.next_id.fetch_add(1, Ordering::SeqCst));
        jobs.insert(id, Arc::new(JobChannel::new(self.buffer_chars)));
        debug!(target: JOB_TARGET, job_id = %id, live = jobs.len(), "job created");
        Ok(id)
    }

    /// Write end of the job's channel, if the job is still alive.
    #[must_use]
    pub fn writer(&self, id: JobId) -> Option<JobWriter> {
        self.lock().get(&id).cloned().map(JobWriter::new)
    }

    /// Read end of the job's channel, if the job is still alive.
    #[must_use]
    pub fn reader(&self, id: JobId) -> Option<JobReader> {
        self.lock().get(&id).cloned().map(JobReader::new)
    }

    /// Kills the job and releases its channel. Returns `false` when the job
    /// was already gone.
    pub fn kill_job(&self, id: JobId) -> bool {
        let removed = self.lock().remove(&id);
        match removed {
            Some(channel) => {
                channel.close();
                debug!(target: JOB_TARGET, job_id = %id, "job killed");
                true
            }
            None => false,
        }
    }

    /// Number of live jobs.
    #[must_use]
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    /// Returns `true` when no job is live.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Total number of jobs ever allocated.
    #[must_use]
    pub fn allocated(&self) -> u64 {
        self.next_id.load(Ordering::SeqCst) - 1
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<JobId, Arc<JobChannel>>> {
        self.jobs.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
