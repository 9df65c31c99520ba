//! Authenticated, rate-limited, retrying API transport
//!
//! [`Transport::execute`] is the only way provider calls reach the network:
//!
//! 1. credentials are looked up once per call
//! 2. every attempt first takes one token from the profile's [`RateLimiter`]
//! 3. each attempt is bounded by the per-attempt timeout
//! 4. the outcome is classified (see [`retry`]); retryable failures sleep
//!    for the backoff delay and go again, up to `max_retries`
//!
//! Cancellation is checked at every attempt boundary, including while
//! waiting for tokens and during backoff sleeps. An attempt already on the
//! wire is never aborted.

pub mod backend;
pub mod retry;

pub use backend::{parse_retry_after, BackendError, HttpBackend, HttpRequest, HttpResponse, Method};

use serde::de::DeserializeOwned;
use std::sync::Arc;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::config::TransportConfig;
use crate::error::{Error, Result};
use crate::ratelimit::RateLimiter;
use crate::traits::CredentialProvider;
use retry::{classify, preview, retry_delay, Verdict};

/// Executes provider API calls
///
/// Cheap to share: wrap in an `Arc` and call from any number of tasks. The
/// only state shared between calls is the rate limiter.
pub struct Transport {
    backend: Arc<dyn HttpBackend>,
    credentials: Arc<dyn CredentialProvider>,
    profile: String,
    limiter: Arc<RateLimiter>,
    base_url: String,
    config: TransportConfig,
    shutdown: CancellationToken,
}

impl Transport {
    /// Create a transport
    ///
    /// `base_url` is joined with each call's path; a trailing slash is
    /// ignored.
    pub fn new(
        backend: Arc<dyn HttpBackend>,
        credentials: Arc<dyn CredentialProvider>,
        profile: impl Into<String>,
        limiter: Arc<RateLimiter>,
        base_url: impl Into<String>,
        config: TransportConfig,
    ) -> Result<Self> {
        config.validate()?;
        let base_url = base_url.into().trim_end_matches('/').to_string();
        if base_url.is_empty() {
            return Err(Error::config("Transport base URL cannot be empty"));
        }
        Ok(Self {
            backend,
            credentials,
            profile: profile.into(),
            limiter,
            base_url,
            config,
            shutdown: CancellationToken::new(),
        })
    }

    /// Stop retrying once `token` is cancelled
    pub fn with_shutdown(mut self, token: CancellationToken) -> Self {
        self.shutdown = token;
        self
    }

    /// Credential profile this transport authenticates as
    pub fn profile(&self) -> &str {
        &self.profile
    }

    /// Execute a call and return the successful response
    pub async fn execute(
        &self,
        method: Method,
        path: &str,
        body: Option<&serde_json::Value>,
    ) -> Result<HttpResponse> {
        let credentials = self.credentials.get_credentials(&self.profile).await?;
        let url = format!("{}{}", self.base_url, path);
        let mut headers = credentials.auth_headers();
        if body.is_some() {
            headers.push(("Content-Type".to_string(), "application/json".to_string()));
        }

        let policy = &self.config.retry;
        let timeout = self.config.attempt_timeout();
        let deadline = self.config.call_deadline().map(|d| Instant::now() + d);

        let mut attempts: u32 = 0;
        loop {
            if self.shutdown.is_cancelled() {
                return Err(self.cancelled(method, &url, attempts));
            }

            tokio::select! {
                biased;
                _ = self.shutdown.cancelled() => {
                    return Err(self.cancelled(method, &url, attempts));
                }
                admitted = self.limiter.admit(1) => admitted?,
            }

            attempts += 1;
            debug!("{} {} (attempt {})", method, url, attempts);

            let request = HttpRequest {
                method,
                url: url.clone(),
                headers: headers.clone(),
                body: body.cloned(),
                timeout,
            };
            let outcome = match tokio::time::timeout(timeout, self.backend.send(request)).await {
                Ok(outcome) => outcome,
                Err(_) => Err(BackendError::Timeout(format!("no response within {:?}", timeout))),
            };

            let (status, retry_after, reason) = match classify(outcome, attempts) {
                Verdict::Done(response) => {
                    debug!("{} {} -> {}", method, url, response.status);
                    return Ok(response);
                }
                Verdict::Fail(error) => {
                    debug!("{} {} failed: {}", method, url, error);
                    return Err(error);
                }
                Verdict::Retry {
                    status,
                    retry_after,
                    reason,
                } => (status, retry_after, reason),
            };

            if attempts > policy.max_retries {
                warn!(
                    "{} {} giving up after {} attempt(s): {}",
                    method, url, attempts, reason
                );
                return Err(Error::transport(
                    status,
                    attempts,
                    format!("retries exhausted: {}", reason),
                ));
            }

            let delay = retry_delay(policy, attempts - 1, retry_after);
            if let Some(deadline) = deadline {
                if Instant::now() + delay > deadline {
                    warn!("{} {} call deadline exceeded: {}", method, url, reason);
                    return Err(Error::transport(
                        status,
                        attempts,
                        format!("deadline exceeded: {}", reason),
                    ));
                }
            }

            warn!(
                "{} {} failed (attempt {}/{}), retrying in {:.1}s: {}",
                method,
                url,
                attempts,
                policy.max_retries + 1,
                delay.as_secs_f32(),
                reason
            );

            tokio::select! {
                biased;
                _ = self.shutdown.cancelled() => {
                    return Err(self.cancelled(method, &url, attempts));
                }
                _ = tokio::time::sleep(delay) => {}
            }
        }
    }

    /// Execute a call and decode the JSON response body
    pub async fn execute_json<T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        body: Option<&serde_json::Value>,
    ) -> Result<T> {
        let response = self.execute(method, path, body).await?;
        serde_json::from_str(&response.body).map_err(|e| {
            warn!(
                "{} {}{}: undecodable response body: {}",
                method,
                self.base_url,
                path,
                preview(&response.body)
            );
            Error::Json(e)
        })
    }

    fn cancelled(&self, method: Method, url: &str, attempts: u32) -> Error {
        debug!("{} {} cancelled after {} attempt(s)", method, url, attempts);
        Error::Cancelled(format!("{} {} cancelled after {} attempt(s)", method, url, attempts))
    }
}

impl std::fmt::Debug for Transport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Transport")
            .field("base_url", &self.base_url)
            .field("profile", &self.profile)
            .field("config", &self.config)
            .finish()
    }
}
