use crate::logging::LogFormat;
use crate::socket::SocketEndpoint;

/// Default TCP port the console listens on.
pub const DEFAULT_TCP_PORT: u16 = 3658;

/// Default host the console binds to. Loopback only: the console has no
/// authentication of its own.
pub const DEFAULT_TCP_HOST: &str = "127.0.0.1";

/// Default log filter expression.
pub const DEFAULT_LOG_FILTER: &str = "info";

/// Prompt re-emitted after each completed command or blank line.
pub const DEFAULT_PROMPT: &str = "ga?>";

/// WHATWG label of the default session character encoding.
pub const DEFAULT_CHARSET: &str = "UTF-8";

/// Interval between drain attempts while a job has produced no new output.
pub const DEFAULT_DRAIN_INTERVAL_MS: u64 = 200;

/// Characters read from a job's output channel per drain iteration.
pub const DEFAULT_DRAIN_BUFFER_CHARS: usize = 4 * 1024;

/// Characters a single job may hold unread before writes start failing.
pub const DEFAULT_JOB_BUFFER_CHARS: usize = 1024 * 1024;

/// Upper bound on simultaneously registered jobs.
pub const DEFAULT_MAX_JOBS: usize = 1024;

/// Idle time after which a session is reaped.
pub const DEFAULT_SESSION_TIMEOUT_SECS: u64 = 30 * 60;

/// Longest input line accepted from a client.
pub const DEFAULT_MAX_LINE_BYTES: usize = 64 * 1024;

/// Default log filter expression used by the binaries.
pub fn default_log_filter() -> &'static str {
    DEFAULT_LOG_FILTER
}

/// Owned log filter value used where allocation is required (e.g. serde).
pub fn default_log_filter_string() -> String {
    DEFAULT_LOG_FILTER.to_owned()
}

/// Default logging format for the binaries.
pub fn default_log_format() -> LogFormat {
    LogFormat::Json
}

/// Endpoint the console listens on when nothing else is configured.
pub fn default_socket_endpoint() -> SocketEndpoint {
    SocketEndpoint::tcp(DEFAULT_TCP_HOST, DEFAULT_TCP_PORT)
}

pub(crate) fn default_prompt() -> String {
    DEFAULT_PROMPT.to_owned()
}

pub(crate) fn default_charset() -> String {
    DEFAULT_CHARSET.to_owned()
}

pub(crate) const fn default_drain_interval_ms() -> u64 {
    DEFAULT_DRAIN_INTERVAL_MS
}

pub(crate) const fn default_drain_buffer_chars() -> usize {
    DEFAULT_DRAIN_BUFFER_CHARS
}

pub(crate) const fn default_job_buffer_chars() -> usize {
    DEFAULT_JOB_BUFFER_CHARS
}

pub(crate) const fn default_max_jobs() -> usize {
    DEFAULT_MAX_JOBS
}

pub(crate) const fn default_session_timeout_secs() -> u64 {
    DEFAULT_SESSION_TIMEOUT_SECS
}

pub(crate) const fn default_max_line_bytes() -> usize {
    DEFAULT_MAX_LINE_BYTES
}
