//! Background jobs and their output channels.
//!
//! A job is created for every command that reaches execution. The command's
//! action writes text into the job through a [`JobWriter`]; the command
//! handler drains it through a [`JobReader`] and forwards it to the client.
//! Both ends are looked up by [`JobId`] in the shared [`JobRegistry`], so a
//! job that has been killed simply stops resolving.

mod channel;
mod registry;

use std::fmt;

#[cfg(test)]
pub(crate) use self::channel::TRUNCATION_NOTICE;
pub use self::channel::{JobReader, JobWriter, ReadOutcome};
pub use self::registry::{JobError, JobRegistry};

pub(crate) const JOB_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::job");

/// Identifier of a job, unique for the lifetime of its registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct JobId(u64);

impl JobId {
    pub(crate) const fn new(raw: u64) -> Self {
        Self(raw)
    }

    /// Returns the numeric identifier.
    #[must_use]
    pub const fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
