use super::{Command, PrepareError};

/// Turns an input line into a [`Command`].
///
/// The handler only calls `parse` for lines that are not blank.
pub trait CommandParser: Send + Sync {
    /// Parses `line`.
    ///
    /// # Errors
    ///
    /// Returns a [`PrepareError`] when the command is unknown, fails to
    /// initialise, or rejects its arguments.
    fn parse(&self, line: &str) -> Result<Command, PrepareError>;
}
