//! HTTP transport used to retrieve statements.

use reqwest::header::{ACCEPT, CONTENT_TYPE};
use std::time::{Duration, Instant};
use url::Url;

/// Per-resolution context threaded through every retrieval.
///
/// Carries an optional deadline. Once it has passed, retrievals fail with a
/// cancellation instead of going to the network.
#[derive(Debug, Clone, Copy, Default)]
pub struct RequestContext {
    deadline: Option<Instant>,
}

impl RequestContext {
    /// A context without a deadline.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_deadline(deadline: Instant) -> Self {
        Self {
            deadline: Some(deadline),
        }
    }

    /// A context expiring `timeout` from now. A timeout too large to
    /// represent as an instant leaves the context unbounded.
    pub fn with_timeout(timeout: Duration) -> Self {
        Self {
            deadline: Instant::now().checked_add(timeout),
        }
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Time left before the deadline. `None` means unbounded.
    pub fn remaining(&self) -> Option<Duration> {
        self.deadline
            .map(|d| d.saturating_duration_since(Instant::now()))
    }

    pub fn is_expired(&self) -> bool {
        self.remaining().is_some_and(|r| r.is_zero())
    }
}

/// A response as seen by the retrieval pipeline.
#[derive(Debug, Clone, PartialEq)]
pub struct HttpResponse {
    pub status: u16,
    pub content_type: Option<String>,
    pub body: String,
}

/// Errors that can occur while performing a request.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("request cancelled: deadline exceeded")]
    Cancelled,

    #[error("request to {url} failed: {reason}")]
    Request { url: String, reason: String },
}

/// Performs GET requests on behalf of the resolver.
pub trait Transport: Send + Sync {
    /// GETs `url` with the given `Accept` header.
    ///
    /// # Errors
    ///
    /// [`TransportError::Cancelled`] if `ctx`'s deadline passes before or
    /// during the request, [`TransportError::Request`] on any I/O failure.
    /// Non-2xx statuses are responses, not errors.
    fn get(&self, ctx: &RequestContext, url: &Url, accept: &str) -> Result<HttpResponse, TransportError>;
}

/// Blocking `reqwest` transport.
///
/// Must be constructed and dropped outside of an async context.
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    client: reqwest::blocking::Client,
    timeout: Duration,
}

impl ReqwestTransport {
    /// Builds a transport whose requests time out after `timeout`, or
    /// earlier if a request context's deadline is closer.
    pub fn new(timeout: Duration) -> Result<Self, TransportError> {
        let client = reqwest::blocking::Client::builder()
            .user_agent(concat!("oidfed/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| TransportError::Request {
                url: String::new(),
                reason: e.to_string(),
            })?;
        Ok(Self { client, timeout })
    }
}

impl Transport for ReqwestTransport {
    fn get(&self, ctx: &RequestContext, url: &Url, accept: &str) -> Result<HttpResponse, TransportError> {
        let timeout = match ctx.remaining() {
            Some(remaining) if remaining.is_zero() => return Err(TransportError::Cancelled),
            Some(remaining) => remaining.min(self.timeout),
            None => self.timeout,
        };

        tracing::debug!(%url, "GET");
        let response = self
            .client
            .get(url.clone())
            .header(ACCEPT, accept)
            .timeout(timeout)
            .send()
            .map_err(|e| {
                if e.is_timeout() && ctx.is_expired() {
                    TransportError::Cancelled
                } else {
                    TransportError::Request {
                        url: url.to_string(),
                        reason: e.to_string(),
                    }
                }
            })?;

        let status = response.status().as_u16();
        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let body = response.text().map_err(|e| TransportError::Request {
            url: url.to_string(),
            reason: e.to_string(),
        })?;

        Ok(HttpResponse {
            status,
            content_type,
            body,
        })
    }
}
