//! Streams a job's output to the session until the job is done with.

use tracing::{debug, info};

use super::{HANDLER_TARGET, HandlerSettings};
use crate::job::{JobId, JobRegistry, ReadOutcome};
use crate::session::Session;
use crate::transport::TransportFault;

/// Why a drain loop stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum DrainExit {
    /// The job finished and every byte was written.
    Finished,
    /// The session was destroyed.
    Destroyed,
    /// The job-running flag was cleared by something other than the
    /// conversation holding it.
    Released,
    /// The conversation was interrupted.
    Interrupted,
    /// The job's channel no longer exists.
    JobGone,
    /// The transport was already closed.
    TransportClosed,
    /// Writing failed; the session was destroyed.
    TransportBroken,
}

/// Polls the job's channel and forwards whatever it holds.
///
/// Empty reads on an unfinished job sleep for the drain interval, waking
/// early on interrupt. The caller owns job cleanup and the job-running flag.
pub(crate) fn drain(
    session: &Session,
    jobs: &JobRegistry,
    job_id: JobId,
    settings: &HandlerSettings,
) -> DrainExit {
    loop {
        if session.is_destroyed() {
            return DrainExit::Destroyed;
        }
        if !session.has_job_running() {
            return DrainExit::Released;
        }
        if session.is_interrupted() {
            return DrainExit::Interrupted;
        }
        let Some(reader) = jobs.reader(job_id) else {
            return DrainExit::JobGone;
        };

        session.touch();

        match reader.read(settings.drain_buffer_chars) {
            ReadOutcome::Finished => return DrainExit::Finished,
            ReadOutcome::Empty => {
                session.pause(settings.drain_interval);
            }
            ReadOutcome::Closed => return DrainExit::JobGone,
            ReadOutcome::Data(text) => match session.write_text(&text) {
                Ok(()) => {}
                Err(TransportFault::Closed) => {
                    debug!(
                        target: HANDLER_TARGET,
                        session_id = %session.id(),
                        job_id = %job_id,
                        "write failed because the transport is closed"
                    );
                    return DrainExit::TransportClosed;
                }
                Err(TransportFault::Broken(error)) => {
                    info!(
                        target: HANDLER_TARGET,
                        session_id = %session.id(),
                        job_id = %job_id,
                        error = %error,
                        "network write failed; destroying session"
                    );
                    session.destroy();
                    return DrainExit::TransportBroken;
                }
            },
        }
    }
}
