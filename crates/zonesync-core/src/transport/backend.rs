//! Single-shot HTTP primitive
//!
//! The transport only needs to send a request with headers and a body,
//! receive a status and body, and honor a timeout. Everything above that
//! (authentication, retry, rate limiting) is done by
//! [`Transport`](super::Transport), so backends stay thin and easy to fake.

use async_trait::async_trait;
use std::fmt;
use std::time::Duration;
use thiserror::Error;

/// HTTP method
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    /// GET
    Get,
    /// POST
    Post,
    /// PUT
    Put,
    /// PATCH
    Patch,
    /// DELETE
    Delete,
}

impl Method {
    /// Upper-case method name
    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Post => "POST",
            Method::Put => "PUT",
            Method::Patch => "PATCH",
            Method::Delete => "DELETE",
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A fully built request
#[derive(Clone)]
pub struct HttpRequest {
    /// Method
    pub method: Method,
    /// Absolute URL
    pub url: String,
    /// Headers, including authentication
    pub headers: Vec<(String, String)>,
    /// JSON body
    pub body: Option<serde_json::Value>,
    /// Timeout for this single attempt
    pub timeout: Duration,
}

impl HttpRequest {
    /// Value of the first header with this name (case-insensitive)
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

// Headers carry credentials; keep them out of logs
impl fmt::Debug for HttpRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HttpRequest")
            .field("method", &self.method)
            .field("url", &self.url)
            .field("headers", &"<REDACTED>")
            .field("has_body", &self.body.is_some())
            .field("timeout", &self.timeout)
            .finish()
    }
}

/// A response of any status
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    /// HTTP status code
    pub status: u16,
    /// Raw body text
    pub body: String,
    /// Parsed `Retry-After` header
    pub retry_after: Option<Duration>,
}

impl HttpResponse {
    /// Response with a status and body
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
            retry_after: None,
        }
    }

    /// Attach a `Retry-After` delay
    pub fn with_retry_after(mut self, delay: Duration) -> Self {
        self.retry_after = Some(delay);
        self
    }

    /// Whether the status is 2xx
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Failure below the HTTP layer
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BackendError {
    /// The attempt timed out
    #[error("request timed out: {0}")]
    Timeout(String),

    /// Connection could not be established or was reset
    #[error("connection failed: {0}")]
    Connect(String),

    /// Anything else (TLS setup, malformed URL, body encoding)
    #[error("request failed: {0}")]
    Other(String),
}

impl BackendError {
    /// Network-level failures that are worth another attempt
    pub fn is_retryable(&self) -> bool {
        matches!(self, BackendError::Timeout(_) | BackendError::Connect(_))
    }
}

/// Sends one HTTP request
#[async_trait]
pub trait HttpBackend: Send + Sync {
    /// Send `request` once and return whatever status came back
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, BackendError>;
}

/// Parse a `Retry-After` header value
///
/// Accepts delta-seconds or an HTTP date; a date in the past yields zero.
pub fn parse_retry_after(value: &str) -> Option<Duration> {
    let value = value.trim();
    if let Ok(secs) = value.parse::<u64>() {
        return Some(Duration::from_secs(secs));
    }
    let when = chrono::DateTime::parse_from_rfc2822(value).ok()?;
    let delta = when.with_timezone(&chrono::Utc) - chrono::Utc::now();
    Some(delta.to_std().unwrap_or(Duration::ZERO))
}
