//! Shared configuration for the diagnostic console.
//!
//! Values are layered by [`ortho_config`]: built-in defaults, then the file
//! named by `--config-path` or `PROBE_CONFIG_PATH`, then `PROBE_*` environment
//! variables, then command-line flags.

mod defaults;
mod logging;
mod socket;

use std::time::Duration;

use ortho_config::OrthoConfig;
use serde::{Deserialize, Serialize};

pub use defaults::{
    DEFAULT_CHARSET, DEFAULT_DRAIN_BUFFER_CHARS, DEFAULT_DRAIN_INTERVAL_MS,
    DEFAULT_JOB_BUFFER_CHARS, DEFAULT_LOG_FILTER, DEFAULT_MAX_JOBS, DEFAULT_MAX_LINE_BYTES,
    DEFAULT_PROMPT, DEFAULT_SESSION_TIMEOUT_SECS, DEFAULT_TCP_HOST, DEFAULT_TCP_PORT,
    default_log_filter, default_log_filter_string, default_log_format, default_socket_endpoint,
};
pub use logging::{LogFormat, LogFormatParseError};
pub use socket::{SocketEndpoint, SocketParseError, SocketPreparationError};

/// Resolved console configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize, OrthoConfig)]
#[ortho_config(prefix = "PROBE")]
pub struct Config {
    /// Endpoint the console listens on.
    #[serde(default = "default_socket_endpoint")]
    pub listen: SocketEndpoint,
    /// `tracing` filter expression.
    #[serde(default = "default_log_filter_string")]
    pub log_filter: String,
    /// Log output format.
    #[serde(default = "default_log_format")]
    pub log_format: LogFormat,
    /// Prompt written after every completed command.
    #[serde(default = "defaults::default_prompt")]
    pub prompt: String,
    /// Character encoding label used for every session.
    #[serde(default = "defaults::default_charset")]
    pub charset: String,
    /// Drain polling interval in milliseconds.
    #[serde(default = "defaults::default_drain_interval_ms")]
    pub drain_interval_ms: u64,
    /// Characters read from a job per drain iteration.
    #[serde(default = "defaults::default_drain_buffer_chars")]
    pub drain_buffer_chars: usize,
    /// Unread characters a job may buffer before its writes fail.
    #[serde(default = "defaults::default_job_buffer_chars")]
    pub job_buffer_chars: usize,
    /// Maximum number of simultaneously registered jobs.
    #[serde(default = "defaults::default_max_jobs")]
    pub max_jobs: usize,
    /// Idle session timeout in seconds; zero disables reaping.
    #[serde(default = "defaults::default_session_timeout_secs")]
    pub session_timeout_secs: u64,
    /// Longest accepted input line in bytes.
    #[serde(default = "defaults::default_max_line_bytes")]
    pub max_line_bytes: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            listen: default_socket_endpoint(),
            log_filter: default_log_filter_string(),
            log_format: default_log_format(),
            prompt: defaults::default_prompt(),
            charset: defaults::default_charset(),
            drain_interval_ms: DEFAULT_DRAIN_INTERVAL_MS,
            drain_buffer_chars: DEFAULT_DRAIN_BUFFER_CHARS,
            job_buffer_chars: DEFAULT_JOB_BUFFER_CHARS,
            max_jobs: DEFAULT_MAX_JOBS,
            session_timeout_secs: DEFAULT_SESSION_TIMEOUT_SECS,
            max_line_bytes: DEFAULT_MAX_LINE_BYTES,
        }
    }
}

impl Config {
    /// Endpoint the console listens on.
    #[must_use]
    pub fn listen(&self) -> &SocketEndpoint {
        &self.listen
    }

    /// Log filter expression.
    #[must_use]
    pub fn log_filter(&self) -> &str {
        &self.log_filter
    }

    /// Log output format.
    #[must_use]
    pub fn log_format(&self) -> LogFormat {
        self.log_format
    }

    /// Prompt string.
    #[must_use]
    pub fn prompt(&self) -> &str {
        &self.prompt
    }

    /// Character encoding label.
    #[must_use]
    pub fn charset(&self) -> &str {
        &self.charset
    }

    /// Delay between drain attempts on an idle job.
    #[must_use]
    pub fn drain_interval(&self) -> Duration {
        Duration::from_millis(self.drain_interval_ms)
    }

    /// Idle timeout for sessions, or `None` when reaping is disabled.
    #[must_use]
    pub fn session_timeout(&self) -> Option<Duration> {
        (self.session_timeout_secs > 0).then(|| Duration::from_secs(self.session_timeout_secs))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let config = Config::default();
        assert_eq!(config.listen(), &SocketEndpoint::tcp("127.0.0.1", 3658));
        assert_eq!(config.prompt(), "ga?>");
        assert_eq!(config.charset(), "UTF-8");
        assert_eq!(config.drain_interval(), Duration::from_millis(200));
        assert_eq!(config.drain_buffer_chars, 4096);
        assert_eq!(config.session_timeout(), Some(Duration::from_secs(1800)));
    }

    #[test]
    fn zero_timeout_disables_reaping() {
        let config = Config {
            session_timeout_secs: 0,
            ..Config::default()
        };
        assert_eq!(config.session_timeout(), None);
    }
}
