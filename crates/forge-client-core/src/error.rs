use std::sync::Arc;
use std::time::Duration;

pub type Result<T> = std::result::Result<T, Error>;

/// Error surface exposed to callers of [`crate::AuthHandler`] and its collaborators.
#[derive(Debug, thiserror::Error, Clone)]
pub enum Error {
    /// The downstream endpoint answered with `429 Too Many Requests`.
    ///
    /// Produced only by [`crate::validator::validate`] for callers that sit above or bypass
    /// the resiliency policy (429 is otherwise retried transparently by [`crate::policy`]).
    #[error("{message}")]
    TooManyRequests {
        status: u16,
        retry_after: Option<Duration>,
        message: String,
    },

    /// Any other non-2xx response, surfaced unchanged for the caller to inspect or re-raise.
    #[error("{message}")]
    HttpFailure { status: u16, message: String },

    /// A required credential field was missing from [`crate::config::ForgeConfig`].
    #[error("invalid configuration: missing `{field}`")]
    InvalidConfiguration { field: &'static str },

    /// A precondition on a caller-supplied argument was violated.
    #[error("invalid argument: `{field}`")]
    InvalidArgument { field: &'static str },

    /// The circuit breaker is open; the call failed fast without any network I/O.
    #[error("circuit breaker is open")]
    CircuitOpen,

    /// The caller's cancellation signal fired before the operation completed.
    #[error("operation was cancelled")]
    Cancelled,

    /// A single send attempt exceeded its per-attempt timeout.
    #[error("request timed out after {0:?}")]
    Timeout(Duration),

    /// The OAuth token endpoint's response body could not be parsed.
    #[error("failed to parse token response: {0}")]
    TokenParseError(String),

    /// A transport-level failure (DNS, socket, TLS, abrupt close) from `reqwest`, after
    /// exhausting retries. Wrapped in `Arc` so `Error` stays `Clone` the way the cached
    /// token result does.
    #[error("request failed: {0}")]
    Transport(#[from] Arc<reqwest::Error>),
}

pub(crate) fn is_retriable_status(status: u16) -> bool {
    matches!(status, 408 | 429 | 502 | 503 | 504)
}

/// Statuses that count as a breaker failure in addition to the retry set: 500 is not
/// worth retrying (it indicates a genuine server error) but still trips the breaker.
pub(crate) fn is_breaker_failure_status(status: u16) -> bool {
    is_retriable_status(status) || status == 500
}
