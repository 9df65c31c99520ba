//! `reqwest`-based [`HttpBackend`]
//!
//! Sends exactly one request per call. Retries, rate limiting and status
//! classification are owned by the core `Transport`.

use async_trait::async_trait;
use reqwest::header::RETRY_AFTER;
use zonesync_core::transport::{
    parse_retry_after, BackendError, HttpBackend, HttpRequest, HttpResponse, Method,
};
use zonesync_core::{Error, Result};

/// User agent sent with every request
const USER_AGENT: &str = concat!("zonesync/", env!("CARGO_PKG_VERSION"));

/// HTTP backend over a shared `reqwest::Client`
#[derive(Debug, Clone)]
pub struct ReqwestBackend {
    client: reqwest::Client,
}

impl ReqwestBackend {
    /// Build a backend with a fresh client
    ///
    /// No client-level timeout is set; every request carries its own.
    pub fn new() -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| Error::config(format!("Failed to build HTTP client: {}", e)))?;
        Ok(Self { client })
    }
}

fn to_reqwest(method: Method) -> reqwest::Method {
    match method {
        Method::Get => reqwest::Method::GET,
        Method::Post => reqwest::Method::POST,
        Method::Put => reqwest::Method::PUT,
        Method::Patch => reqwest::Method::PATCH,
        Method::Delete => reqwest::Method::DELETE,
    }
}

fn map_error(err: reqwest::Error) -> BackendError {
    if err.is_builder() {
        return BackendError::Other(err.to_string());
    }
    if err.is_timeout() {
        return BackendError::Timeout(err.to_string());
    }
    if err.is_connect() || err.is_request() {
        return BackendError::Connect(err.to_string());
    }
    BackendError::Other(err.to_string())
}

/// Errors while reading a response body
///
/// A body cut short means the connection dropped mid-response.
fn map_body_error(err: reqwest::Error) -> BackendError {
    if err.is_timeout() {
        return BackendError::Timeout(err.to_string());
    }
    if err.is_body() || err.is_decode() {
        return BackendError::Connect(err.to_string());
    }
    map_error(err)
}

#[async_trait]
impl HttpBackend for ReqwestBackend {
    async fn send(&self, request: HttpRequest) -> std::result::Result<HttpResponse, BackendError> {
        let mut builder = self
            .client
            .request(to_reqwest(request.method), &request.url)
            .timeout(request.timeout);
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }

        let response = builder.send().await.map_err(map_error)?;

        let status = response.status().as_u16();
        let retry_after = response
            .headers()
            .get(RETRY_AFTER)
            .and_then(|v| v.to_str().ok())
            .and_then(parse_retry_after);
        let body = response.text().await.map_err(map_body_error)?;

        tracing::trace!("{} {} -> {}", request.method, request.url, status);

        let response = HttpResponse::new(status, body);
        Ok(match retry_after {
            Some(delay) => response.with_retry_after(delay),
            None => response,
        })
    }
}
