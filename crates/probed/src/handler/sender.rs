//! `Sender` bound to one job's output channel.

use std::io;
use std::sync::Arc;

use tracing::warn;

use super::HANDLER_TARGET;
use crate::command::Sender;
use crate::job::{JobId, JobRegistry, JobWriter};
use crate::session::SessionId;

pub(crate) struct JobSender {
    jobs: Arc<JobRegistry>,
    session_id: SessionId,
    job_id: JobId,
}

impl JobSender {
    pub(crate) fn new(jobs: Arc<JobRegistry>, session_id: SessionId, job_id: JobId) -> Self {
        Self {
            jobs,
            session_id,
            job_id,
        }
    }
}

impl Sender for JobSender {
    fn send(&self, is_final: bool, message: &str) {
        let Some(writer) = self.jobs.writer(self.job_id) else {
            return;
        };
        if let Err(error) = write_chunk(&writer, is_final, message) {
            warn!(
                target: HANDLER_TARGET,
                session_id = %self.session_id,
                job_id = %self.job_id,
                error = %error,
                "command write to job failed"
            );
            // Nothing more can reach the reader, so stop it waiting.
            writer.finish();
        }
        if is_final {
            writer.finish();
        }
    }
}

fn write_chunk(writer: &JobWriter, is_final: bool, message: &str) -> io::Result<()> {
    writer.write(message)?;
    if is_final {
        writer.write("\n")?;
    }
    writer.flush()
}
