//! # Failure Classification
//!
//! Maps whatever stopped an execution onto exactly one
//! [`ExecutionErrorKind`]. Checks run in a fixed order: cancellation,
//! timeout, temporary condition, DNS, connection, generic.

use std::error::Error as StdError;
use std::io;
use std::time::Duration;

use crate::error::{ExecutionError, ExecutionErrorKind};

/// Why a round trip did not produce a response.
#[derive(Debug)]
pub(crate) enum Failure {
    /// The execution context was cancelled.
    Canceled,
    /// The execution context's deadline passed.
    DeadlineExceeded,
    /// No response headers arrived within the budget.
    HeaderTimeout(Duration),
    /// The transport itself failed.
    Transport(reqwest::Error),
}

/// What the classifier needs to know about the attempt.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Attempt<'a> {
    pub elapsed: Duration,
    pub host: &'a str,
    pub max_redirects: usize,
}

pub(crate) fn classify(failure: Failure, attempt: Attempt<'_>) -> ExecutionError {
    let elapsed = attempt.elapsed;
    match failure {
        Failure::Canceled => {
            ExecutionError::new(ExecutionErrorKind::Canceled, elapsed, "request canceled", None)
        }
        Failure::DeadlineExceeded => ExecutionError::new(
            ExecutionErrorKind::Timeout,
            elapsed,
            format!("request timeout after {elapsed:?}: context deadline exceeded"),
            None,
        ),
        Failure::HeaderTimeout(budget) => ExecutionError::new(
            ExecutionErrorKind::Timeout,
            elapsed,
            format!("request timeout after {elapsed:?}: no response headers within {budget:?}"),
            None,
        ),
        Failure::Transport(err) => classify_transport(err.without_url(), attempt),
    }
}

fn classify_transport(err: reqwest::Error, attempt: Attempt<'_>) -> ExecutionError {
    let elapsed = attempt.elapsed;
    let detail = error_chain(&err);
    let io_kind = io_error_kind(&err);

    let (kind, message) = if err.is_timeout() || io_kind == Some(io::ErrorKind::TimedOut) {
        (
            ExecutionErrorKind::Timeout,
            format!("request timeout after {elapsed:?}: {detail}"),
        )
    } else if err.is_redirect() {
        (
            ExecutionErrorKind::Generic,
            format!(
                "too many redirects: stopped after {} redirects",
                attempt.max_redirects
            ),
        )
    } else if io_kind.is_some_and(is_temporary) {
        (
            ExecutionErrorKind::Temporary,
            format!("temporary network error: {detail}"),
        )
    } else if is_dns_failure(&err) {
        (
            ExecutionErrorKind::DnsFailure,
            format!("DNS lookup failed for {}: {detail}", attempt.host),
        )
    } else if err.is_connect() {
        (
            ExecutionErrorKind::ConnectionFailure,
            format!("connection failed: dial: {detail}"),
        )
    } else if io_kind.is_some() {
        let op = if err.is_body() || err.is_decode() {
            "read"
        } else {
            "write"
        };
        (
            ExecutionErrorKind::ConnectionFailure,
            format!("connection failed: {op}: {detail}"),
        )
    } else {
        (
            ExecutionErrorKind::Generic,
            format!("request failed: {detail}"),
        )
    };

    ExecutionError::new(kind, elapsed, message, Some(err))
}

fn is_temporary(kind: io::ErrorKind) -> bool {
    matches!(
        kind,
        io::ErrorKind::ConnectionReset
            | io::ErrorKind::ConnectionAborted
            | io::ErrorKind::Interrupted
            | io::ErrorKind::WouldBlock
    )
}

fn sources<'a>(err: &'a (dyn StdError + 'static)) -> impl Iterator<Item = &'a (dyn StdError + 'static)> {
    std::iter::successors(Some(err), |&e| e.source())
}

fn io_error_kind(err: &reqwest::Error) -> Option<io::ErrorKind> {
    sources(err).find_map(|e| e.downcast_ref::<io::Error>().map(io::Error::kind))
}

// The resolver error is not exported as a type through reqwest; hyper-util
// labels it "dns error" and getaddrinfo reports "failed to lookup address".
fn is_dns_failure(err: &reqwest::Error) -> bool {
    err.is_connect()
        && sources(err).any(|e| {
            let text = e.to_string();
            text.contains("dns error") || text.contains("failed to lookup address")
        })
}

/// Render an error and its causes as "outer: cause: root".
fn error_chain(err: &reqwest::Error) -> String {
    let mut parts: Vec<String> = Vec::new();
    for e in sources(err) {
        let text = e.to_string();
        if !parts.last().is_some_and(|last| last.contains(&text)) {
            parts.push(text);
        }
    }
    parts.join(": ")
}
