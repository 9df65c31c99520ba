//! Response classification and backoff
//!
//! | Outcome                      | Handling                           |
//! |------------------------------|------------------------------------|
//! | 2xx                          | success                            |
//! | 401, 403                     | `Authentication`, not retried      |
//! | 404                          | `NotFound`, not retried            |
//! | 400, 422                     | `InvalidRequest`, not retried      |
//! | 429, 5xx, timeout, connect   | retried with backoff               |
//! | anything else                | `Transport`, not retried           |

use rand::Rng;
use serde::Deserialize;
use std::time::Duration;

use super::backend::{BackendError, HttpResponse};
use crate::config::RetryConfig;
use crate::error::Error;

const LOG_PREVIEW_CHARS: usize = 200;

/// What to do with one attempt's outcome
#[derive(Debug)]
pub(crate) enum Verdict {
    /// Hand the response to the caller
    Done(HttpResponse),
    /// Try again after a delay
    Retry {
        status: Option<u16>,
        retry_after: Option<Duration>,
        reason: String,
    },
    /// Give up with this error
    Fail(Error),
}

/// Error body returned by the provider
#[derive(Debug, Default, Deserialize)]
struct ProviderErrorBody {
    #[serde(default)]
    code: Option<String>,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    fields: Option<serde_json::Value>,
}

pub(crate) fn classify(outcome: Result<HttpResponse, BackendError>, attempts: u32) -> Verdict {
    let response = match outcome {
        Ok(response) => response,
        Err(e) if e.is_retryable() => {
            return Verdict::Retry {
                status: None,
                retry_after: None,
                reason: e.to_string(),
            };
        }
        Err(e) => return Verdict::Fail(Error::transport(None, attempts, e.to_string())),
    };

    let status = response.status;
    if response.is_success() {
        return Verdict::Done(response);
    }

    if status == 429 || (500..600).contains(&status) {
        return Verdict::Retry {
            status: Some(status),
            retry_after: response.retry_after,
            reason: format!("HTTP {}: {}", status, preview(&response.body)),
        };
    }

    let body: ProviderErrorBody = serde_json::from_str(&response.body).unwrap_or_default();
    let message = describe(status, &body, &response.body);

    let error = match status {
        401 | 403 => Error::Authentication {
            status: Some(status),
            message,
        },
        404 => Error::not_found(message),
        400 | 422 => Error::InvalidRequest {
            status,
            message,
            fields: body.fields,
        },
        _ => Error::transport(Some(status), attempts, message),
    };
    Verdict::Fail(error)
}

fn describe(status: u16, body: &ProviderErrorBody, raw: &str) -> String {
    match (&body.code, &body.message) {
        (Some(code), Some(message)) => format!("{} ({})", message, code),
        (None, Some(message)) => message.clone(),
        (Some(code), None) => format!("HTTP {} ({})", status, code),
        (None, None) if raw.trim().is_empty() => format!("HTTP {}", status),
        (None, None) => format!("HTTP {}: {}", status, preview(raw)),
    }
}

/// Exponential delay before retry number `retry` (0-based), without jitter
pub fn backoff_delay(policy: &RetryConfig, retry: u32) -> Duration {
    let exp = retry.min(32);
    let multiplier = u64::from(policy.factor).saturating_pow(exp);
    let ms = policy
        .base_backoff_ms
        .saturating_mul(multiplier)
        .min(policy.max_backoff_ms);
    Duration::from_millis(ms)
}

/// Delay before retry number `retry`
///
/// A server-provided `Retry-After` replaces the computed backoff and is
/// capped at `max_backoff_ms`; otherwise the exponential delay gets ±jitter.
pub fn retry_delay(policy: &RetryConfig, retry: u32, retry_after: Option<Duration>) -> Duration {
    let cap = Duration::from_millis(policy.max_backoff_ms);
    if let Some(after) = retry_after {
        return after.min(cap);
    }
    let base = backoff_delay(policy, retry);
    if policy.jitter <= 0.0 {
        return base;
    }
    let factor = rand::thread_rng().gen_range((1.0 - policy.jitter)..=(1.0 + policy.jitter));
    base.mul_f64(factor).min(cap)
}

pub(crate) fn preview(text: &str) -> String {
    let trimmed = text.trim();
    if trimmed.chars().count() <= LOG_PREVIEW_CHARS {
        return trimmed.to_string();
    }
    let cut: String = trimmed.chars().take(LOG_PREVIEW_CHARS).collect();
    format!("{}...", cut)
}
