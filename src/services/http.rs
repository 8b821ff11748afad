//! # HTTP Execution Engine
//!
//! Turns a [`Request`] into a wire request, sends it under the configured
//! timeout and redirect policy, and normalizes whatever comes back into a
//! [`Response`] or a classified [`ExecutionError`](crate::error::ExecutionError).

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use bytes::Bytes;
use chrono::Utc;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, CONTENT_LENGTH};
use reqwest::{redirect, Client, StatusCode, Url};
use tokio_util::sync::CancellationToken;

use crate::error::{EngineBuildError, Error};
use crate::models::{Request, Response};
use crate::services::classify::{classify, Attempt, Failure};
use crate::services::decode::decode_body;
use crate::utils::merge_query_pairs;

/// Transport settings. Each field stands alone; a zero duration disables
/// that particular limit.
#[derive(Debug, Clone, PartialEq)]
pub struct ClientConfig {
    /// Upper bound for the whole exchange, body included
    pub timeout: Duration,
    pub max_redirects: usize,
    pub follow_redirects: bool,
    /// Accept any certificate. Development only.
    pub danger_skip_tls_verify: bool,
    pub dial_timeout: Duration,
    pub tls_handshake_timeout: Duration,
    /// Time allowed for the response headers once connected
    pub response_header_timeout: Duration,
    pub keep_alive: Duration,
    pub idle_conn_timeout: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            max_redirects: 10,
            follow_redirects: true,
            danger_skip_tls_verify: false,
            dial_timeout: Duration::from_secs(10),
            tls_handshake_timeout: Duration::from_secs(10),
            response_header_timeout: Duration::from_secs(10),
            keep_alive: Duration::from_secs(30),
            idle_conn_timeout: Duration::from_secs(90),
        }
    }
}

/// Cancellation and deadline for a single call.
#[derive(Debug, Clone, Default)]
pub struct ExecutionContext {
    token: CancellationToken,
    deadline: Option<tokio::time::Instant>,
}

impl ExecutionContext {
    /// A context that is never cancelled and has no deadline.
    pub fn new() -> Self {
        Self::default()
    }

    /// Expire `timeout` from now.
    pub fn with_timeout(timeout: Duration) -> Self {
        Self::new().deadline_at(tokio::time::Instant::now() + timeout)
    }

    /// Share cancellation with an existing token.
    pub fn with_cancellation(token: CancellationToken) -> Self {
        Self {
            token,
            deadline: None,
        }
    }

    pub fn deadline_at(mut self, deadline: tokio::time::Instant) -> Self {
        self.deadline = Some(deadline);
        self
    }

    pub fn cancel(&self) {
        self.token.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    pub fn token(&self) -> &CancellationToken {
        &self.token
    }

    pub fn deadline(&self) -> Option<tokio::time::Instant> {
        self.deadline
    }

    fn is_expired(&self) -> bool {
        self.deadline
            .is_some_and(|deadline| tokio::time::Instant::now() >= deadline)
    }
}

/// Status, headers and body as read off the wire.
struct Received {
    status: StatusCode,
    headers: HashMap<String, String>,
    content_length: Option<u64>,
    body: Bytes,
}

/// Executes requests. Immutable once built; clones share the connection pool.
#[derive(Debug, Clone)]
pub struct HttpEngine {
    client: Client,
    config: Arc<ClientConfig>,
}

impl HttpEngine {
    pub fn new(config: ClientConfig) -> Result<Self, EngineBuildError> {
        if config.danger_skip_tls_verify {
            tracing::warn!("TLS certificate verification is disabled");
        }

        let mut builder = Client::builder()
            .redirect(redirect_policy(&config))
            .danger_accept_invalid_certs(config.danger_skip_tls_verify)
            .tcp_keepalive(non_zero(config.keep_alive))
            .pool_idle_timeout(non_zero(config.idle_conn_timeout));

        if let Some(timeout) = non_zero(config.timeout) {
            builder = builder.timeout(timeout);
        }
        if let Some(connect) =
            non_zero(config.dial_timeout.saturating_add(config.tls_handshake_timeout))
        {
            builder = builder.connect_timeout(connect);
        }

        let client = builder.build()?;
        tracing::debug!(
            "Built HTTP engine: timeout={:?} follow_redirects={} max_redirects={}",
            config.timeout,
            config.follow_redirects,
            config.max_redirects
        );

        Ok(Self {
            client,
            config: Arc::new(config),
        })
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Execute one request. No retries.
    pub async fn execute(
        &self,
        ctx: &ExecutionContext,
        request: &Request,
    ) -> Result<Response, Error> {
        if let Err(e) = request.validate() {
            tracing::warn!("Rejected request {}: {}", request.id(), e);
            return Err(e.into());
        }

        let mut wire = build_wire_request(request)?;
        request.auth().apply(&mut wire)?;

        let host = wire.url().host_str().unwrap_or_default().to_string();
        tracing::info!(
            "Executing {} {}{}",
            wire.method(),
            host,
            wire.url().path()
        );

        let start = Instant::now();
        let outcome = self.round_trip(ctx, wire).await;
        let elapsed = start.elapsed();

        match outcome {
            Ok(received) => {
                let response = convert(received, elapsed, request.id());
                tracing::info!(
                    "Received {} from {} in {:?}",
                    response.status,
                    host,
                    elapsed
                );
                Ok(response)
            }
            Err(failure) => {
                let err = classify(
                    failure,
                    Attempt {
                        elapsed,
                        host: &host,
                        max_redirects: self.config.max_redirects,
                    },
                );
                tracing::error!("Request to {} failed ({}): {}", host, err.kind(), err);
                Err(err.into())
            }
        }
    }

    async fn round_trip(
        &self,
        ctx: &ExecutionContext,
        wire: reqwest::Request,
    ) -> Result<Received, Failure> {
        if ctx.is_cancelled() {
            return Err(Failure::Canceled);
        }
        if ctx.is_expired() {
            return Err(Failure::DeadlineExceeded);
        }

        let deadline = async {
            match ctx.deadline() {
                Some(at) => tokio::time::sleep_until(at).await,
                None => std::future::pending::<()>().await,
            }
        };

        tokio::select! {
            biased;
            _ = ctx.token().cancelled() => Err(Failure::Canceled),
            _ = deadline => Err(Failure::DeadlineExceeded),
            received = self.exchange(wire) => received,
        }
    }

    async fn exchange(&self, wire: reqwest::Request) -> Result<Received, Failure> {
        let send = self.client.execute(wire);
        let response = match self.header_budget() {
            Some(budget) => tokio::time::timeout(budget, send)
                .await
                .map_err(|_| Failure::HeaderTimeout(budget))?,
            None => send.await,
        }
        .map_err(Failure::Transport)?;

        let status = response.status();
        let headers = join_headers(response.headers());
        let content_length = response.content_length();
        let body = response.bytes().await.map_err(Failure::Transport)?;

        Ok(Received {
            status,
            headers,
            content_length,
            body,
        })
    }

    /// Connection setup plus the header allowance.
    fn header_budget(&self) -> Option<Duration> {
        non_zero(self.config.response_header_timeout).map(|header| {
            self.config
                .dial_timeout
                .saturating_add(self.config.tls_handshake_timeout)
                .saturating_add(header)
        })
    }
}

/// Build the wire form of `request` without sending it.
///
/// Request query parameters replace same-named pairs already in the URL and
/// are appended in name order. A body is attached only for methods that
/// carry one.
pub fn build_wire_request(request: &Request) -> Result<reqwest::Request, Error> {
    let method = request.http_method()?;
    let mut url = Url::parse(request.url())
        .map_err(|e| Error::Build(format!("invalid URL {}: {}", request.url(), e)))?;

    merge_query_pairs(
        &mut url,
        request
            .query_params()
            .iter()
            .map(|(name, value)| (name.as_str(), value.as_str())),
    );

    let mut wire = reqwest::Request::new(method.into(), url);

    for (name, value) in request.headers() {
        let header_name = HeaderName::from_bytes(name.as_bytes())
            .map_err(|e| Error::Build(format!("invalid header name {name}: {e}")))?;
        let header_value = HeaderValue::from_str(value)
            .map_err(|e| Error::Build(format!("invalid value for header {name}: {e}")))?;
        wire.headers_mut().insert(header_name, header_value);
    }

    if let Some(body) = request.wire_body() {
        wire.headers_mut()
            .insert(CONTENT_LENGTH, HeaderValue::from(body.len()));
        *wire.body_mut() = Some(body.to_owned().into());
    }

    tracing::debug!(
        "Built {} request for {}",
        wire.method(),
        wire.url().path()
    );
    Ok(wire)
}

fn redirect_policy(config: &ClientConfig) -> redirect::Policy {
    if !config.follow_redirects {
        return redirect::Policy::none();
    }

    let max = config.max_redirects;
    // `previous` includes the original URL, so its length is the number of
    // redirects about to have been followed.
    redirect::Policy::custom(move |attempt| {
        if attempt.previous().len() > max {
            attempt.error(format!("stopped after {max} redirects"))
        } else {
            attempt.follow()
        }
    })
}

fn join_headers(headers: &HeaderMap) -> HashMap<String, String> {
    headers
        .keys()
        .map(|name| {
            let joined = headers
                .get_all(name)
                .iter()
                .map(|v| String::from_utf8_lossy(v.as_bytes()).into_owned())
                .collect::<Vec<_>>()
                .join(", ");
            (name.as_str().to_string(), joined)
        })
        .collect()
}

fn convert(received: Received, elapsed: Duration, request_id: &str) -> Response {
    let status = match received.status.canonical_reason() {
        Some(reason) => format!("{} {}", received.status.as_u16(), reason),
        None => received.status.as_u16().to_string(),
    };
    let body = decode_body(received.body, &received.headers);
    let content_length = received
        .content_length
        .unwrap_or(body.len() as u64);

    Response {
        status_code: received.status.as_u16(),
        status,
        headers: received.headers,
        body,
        content_length,
        duration: elapsed,
        timestamp: Utc::now(),
        request_id: request_id.to_string(),
    }
}

fn non_zero(duration: Duration) -> Option<Duration> {
    (!duration.is_zero()).then_some(duration)
}
