//! # Error Types
//!
//! Validation and auth errors are raised before any network activity and
//! carry no timing. Execution errors always carry the elapsed duration of the
//! attempt. Persistence errors only come from the repositories.

use std::time::Duration;

use thiserror::Error;

/// A request failed one of its shape checks.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("HTTP method cannot be empty")]
    EmptyMethod,

    #[error("invalid HTTP method: {0:?}")]
    InvalidMethod(String),

    #[error("URL cannot be empty")]
    EmptyUrl,

    #[error("invalid URL format: {0:?} (expected http:// or https:// with a host)")]
    InvalidUrl(String),

    #[error("invalid header name: {0:?}")]
    InvalidHeaderName(String),

    #[error("invalid query parameter name: {0:?}")]
    InvalidQueryParam(String),

    #[error("invalid authentication: {0}")]
    Auth(#[from] AuthError),
}

/// An auth strategy is incomplete or could not be attached to a request.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuthError {
    #[error("username is required for basic auth")]
    MissingUsername,

    #[error("password is required for basic auth")]
    MissingPassword,

    #[error("token is required for bearer auth")]
    MissingToken,

    #[error("API key name is required")]
    MissingApiKeyName,

    #[error("API key is required")]
    MissingApiKey,

    #[error("invalid API key location {0:?} (must be 'header' or 'query')")]
    InvalidApiKeyLocation(String),

    #[error("unsupported auth type: {0:?}")]
    UnsupportedKind(String),

    #[error("{kind} auth requires the {field:?} credential")]
    MissingCredential { kind: &'static str, field: &'static str },

    #[error("cannot set auth header: {0}")]
    InvalidHeader(String),
}

/// Failure classes of a transport-level execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExecutionErrorKind {
    /// The caller cancelled the execution context.
    Canceled,
    /// A deadline or transport timeout elapsed.
    Timeout,
    /// A transient network condition such as a reset connection.
    Temporary,
    /// The target hostname could not be resolved.
    DnsFailure,
    /// Dialing, reading or writing the connection failed.
    ConnectionFailure,
    /// Anything else, including exceeding the redirect limit.
    Generic,
}

impl ExecutionErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExecutionErrorKind::Canceled => "canceled",
            ExecutionErrorKind::Timeout => "timeout",
            ExecutionErrorKind::Temporary => "temporary",
            ExecutionErrorKind::DnsFailure => "dns",
            ExecutionErrorKind::ConnectionFailure => "connection",
            ExecutionErrorKind::Generic => "generic",
        }
    }
}

impl std::fmt::Display for ExecutionErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A classified transport failure.
#[derive(Debug, Error)]
#[error("{message}")]
pub struct ExecutionError {
    kind: ExecutionErrorKind,
    elapsed: Duration,
    message: String,
    #[source]
    source: Option<reqwest::Error>,
}

impl ExecutionError {
    pub(crate) fn new(
        kind: ExecutionErrorKind,
        elapsed: Duration,
        message: impl Into<String>,
        source: Option<reqwest::Error>,
    ) -> Self {
        Self {
            kind,
            elapsed,
            message: message.into(),
            source,
        }
    }

    pub fn kind(&self) -> ExecutionErrorKind {
        self.kind
    }

    /// Wall-clock time spent before the failure was observed.
    pub fn elapsed(&self) -> Duration {
        self.elapsed
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn is_canceled(&self) -> bool {
        self.kind == ExecutionErrorKind::Canceled
    }

    pub fn is_timeout(&self) -> bool {
        self.kind == ExecutionErrorKind::Timeout
    }
}

/// Everything `HttpEngine::execute` can fail with.
#[derive(Debug, Error)]
pub enum Error {
    #[error("invalid request: {0}")]
    Validation(#[from] ValidationError),

    #[error("failed to build HTTP request: {0}")]
    Build(String),

    #[error("failed to apply authentication: {0}")]
    Auth(#[from] AuthError),

    #[error(transparent)]
    Execution(#[from] ExecutionError),
}

impl Error {
    /// The execution failure, if the call got as far as the network.
    pub fn as_execution(&self) -> Option<&ExecutionError> {
        match self {
            Error::Execution(e) => Some(e),
            _ => None,
        }
    }

    /// Elapsed duration; only execution failures were timed.
    pub fn elapsed(&self) -> Option<Duration> {
        self.as_execution().map(ExecutionError::elapsed)
    }
}

/// The transport client could not be constructed from a configuration.
#[derive(Debug, Error)]
#[error("failed to build HTTP transport: {0}")]
pub struct EngineBuildError(#[from] pub reqwest::Error);

/// Raised by history and saved-request repositories only.
#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("record not found: {0}")]
    NotFound(String),

    #[error("record already exists: {0}")]
    AlreadyExists(String),

    #[error("storage I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("stored record is malformed: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("storage lock poisoned")]
    Poisoned,
}

/// Saving a request failed before or while it was stored.
#[derive(Debug, Error)]
pub enum SaveError {
    #[error("invalid request: {0}")]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Persistence(#[from] PersistenceError),
}
