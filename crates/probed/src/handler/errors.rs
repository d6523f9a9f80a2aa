use thiserror::Error;

use crate::command::ActionError;
use crate::job::JobError;
use crate::session::SessionId;

/// A command was parsed but could not be run to completion.
#[derive(Debug, Error)]
pub enum ExecuteError {
    #[error("failed to create job for session {session_id}")]
    CreateJob {
        session_id: SessionId,
        #[source]
        source: JobError,
    },
    #[error("action failed in session {session_id}")]
    Action {
        session_id: SessionId,
        #[source]
        source: ActionError,
    },
    #[error("action panicked: {message}")]
    Panicked {
        session_id: SessionId,
        message: String,
    },
}

impl ExecuteError {
    #[must_use]
    pub fn session_id(&self) -> SessionId {
        match self {
            Self::CreateJob { session_id, .. }
            | Self::Action { session_id, .. }
            | Self::Panicked { session_id, .. } => *session_id,
        }
    }
}
