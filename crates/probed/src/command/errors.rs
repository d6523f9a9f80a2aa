//! Failures raised while turning a line into a command or running it.

use std::error::Error as StdError;
use std::io;

use thiserror::Error;

/// A line could not be turned into a runnable command.
///
/// The display form is the exact message written to the client.
#[derive(Debug, Error)]
pub enum PrepareError {
    #[error("command \"{command}\" not found.")]
    NotFound { command: String },
    #[error("command \"{command}\" init failed.")]
    Initialization {
        command: String,
        #[source]
        source: Option<Box<dyn StdError + Send + Sync>>,
    },
    #[error("command \"{command}\" prepare failed : {}", boxed_root_cause(.source))]
    Preparation {
        command: String,
        #[source]
        source: Box<dyn StdError + Send + Sync>,
    },
}

impl PrepareError {
    pub fn not_found(command: impl Into<String>) -> Self {
        Self::NotFound {
            command: command.into(),
        }
    }

    pub fn initialization(command: impl Into<String>) -> Self {
        Self::Initialization {
            command: command.into(),
            source: None,
        }
    }

    pub fn preparation(
        command: impl Into<String>,
        source: impl Into<Box<dyn StdError + Send + Sync>>,
    ) -> Self {
        Self::Preparation {
            command: command.into(),
            source: source.into(),
        }
    }

    /// Name of the command the line asked for.
    #[must_use]
    pub fn command(&self) -> &str {
        match self {
            Self::NotFound { command }
            | Self::Initialization { command, .. }
            | Self::Preparation { command, .. } => command,
        }
    }
}

/// Failure reported by a command action.
#[derive(Debug, Error)]
pub enum ActionError {
    #[error("{0}")]
    Failed(String),
    #[error(transparent)]
    Io(#[from] io::Error),
}

impl ActionError {
    pub fn failed(message: impl Into<String>) -> Self {
        Self::Failed(message.into())
    }
}

fn boxed_root_cause(error: &Box<dyn StdError + Send + Sync>) -> String {
    root_cause_message(&**error)
}

/// Message of the innermost error in a `source()` chain.
pub(crate) fn root_cause_message(error: &(dyn StdError + 'static)) -> String {
    let mut current = error;
    while let Some(next) = current.source() {
        current = next;
    }
    current.to_string()
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[rstest]
    #[case(PrepareError::not_found("foo"), "command \"foo\" not found.")]
    #[case(PrepareError::initialization("foo"), "command \"foo\" init failed.")]
    #[case(
        PrepareError::preparation("foo", "bad argument"),
        "command \"foo\" prepare failed : bad argument"
    )]
    fn messages_match_the_console_protocol(#[case] error: PrepareError, #[case] expected: &str) {
        assert_eq!(error.to_string(), expected);
        assert_eq!(error.command(), "foo");
    }

    #[test]
    fn preparation_reports_the_root_cause() {
        let inner = io::Error::other("disk gone");
        let wrapped = ActionError::Io(inner);
        let error = PrepareError::preparation("dump", wrapped);
        assert_eq!(error.to_string(), "command \"dump\" prepare failed : disk gone");
    }
}
