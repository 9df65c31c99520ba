//! Configuration types for zonesync
//!
//! Every struct here is passed explicitly through constructors; nothing is
//! read from ambient process state.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Top-level configuration for one synchronization run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncConfig {
    /// Domain being reconciled (e.g. "example.com")
    pub domain: String,

    /// DNS provider configuration
    pub provider: ProviderConfig,

    /// Transport settings (timeouts, retry policy)
    #[serde(default)]
    pub transport: TransportConfig,

    /// Outbound request budget per credential profile
    #[serde(default)]
    pub rate_limit: RateLimitConfig,

    /// Reconciliation options
    #[serde(default)]
    pub reconcile: ReconcileOptions,
}

impl SyncConfig {
    /// Create a configuration with defaults for everything but domain and provider
    pub fn new(domain: impl Into<String>, provider: ProviderConfig) -> Self {
        Self {
            domain: domain.into(),
            provider,
            transport: TransportConfig::default(),
            rate_limit: RateLimitConfig::default(),
            reconcile: ReconcileOptions::default(),
        }
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        if self.domain.trim().is_empty() {
            return Err(crate::Error::config("Domain cannot be empty"));
        }

        self.provider.validate()?;
        self.transport.validate()?;
        self.rate_limit.validate()?;
        self.reconcile.validate()?;

        Ok(())
    }
}

/// DNS provider configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ProviderConfig {
    /// GoDaddy domains API
    #[serde(rename = "godaddy")]
    GoDaddy {
        /// Credential profile name
        #[serde(default = "default_profile")]
        profile: String,
        /// Target environment
        #[serde(default)]
        environment: Environment,
        /// Override of the environment's base URL
        #[serde(default)]
        base_url: Option<String>,
    },

    /// Custom provider
    Custom {
        /// Factory name to use
        factory: String,
        /// Custom configuration data
        config: serde_json::Value,
    },
}

impl ProviderConfig {
    /// Validate the provider configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        match self {
            ProviderConfig::GoDaddy {
                profile, base_url, ..
            } => {
                if profile.trim().is_empty() {
                    return Err(crate::Error::config("GoDaddy profile cannot be empty"));
                }
                if let Some(url) = base_url {
                    if !(url.starts_with("http://") || url.starts_with("https://")) {
                        return Err(crate::Error::config(format!(
                            "GoDaddy base URL must be http(s): {}",
                            url
                        )));
                    }
                }
                Ok(())
            }
            ProviderConfig::Custom { factory, config } => {
                if factory.is_empty() {
                    return Err(crate::Error::config(
                        "Custom provider factory cannot be empty",
                    ));
                }
                if config.is_null() {
                    return Err(crate::Error::config(
                        "Custom provider config cannot be null",
                    ));
                }
                Ok(())
            }
        }
    }

    /// Get the provider type name
    pub fn type_name(&self) -> &str {
        match self {
            ProviderConfig::GoDaddy { .. } => "godaddy",
            ProviderConfig::Custom { factory, .. } => factory,
        }
    }

    /// Credential profile the provider authenticates with
    pub fn profile(&self) -> &str {
        match self {
            ProviderConfig::GoDaddy { profile, .. } => profile,
            ProviderConfig::Custom { config, .. } => config
                .get("profile")
                .and_then(|p| p.as_str())
                .unwrap_or(DEFAULT_PROFILE),
        }
    }
}

/// Provider environment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    /// Live API
    #[default]
    Production,
    /// Operational test environment
    Ote,
}

impl std::str::FromStr for Environment {
    type Err = crate::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "production" | "prod" => Ok(Environment::Production),
            "ote" | "test" => Ok(Environment::Ote),
            other => Err(crate::Error::config(format!(
                "Unknown environment '{}' (expected production or ote)",
                other
            ))),
        }
    }
}

/// Name of the profile used when none is given
pub const DEFAULT_PROFILE: &str = "default";

fn default_profile() -> String {
    DEFAULT_PROFILE.to_string()
}

/// Token bucket settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RateLimitConfig {
    /// Maximum burst (tokens)
    #[serde(default = "default_capacity")]
    pub capacity: u32,

    /// Tokens added per second
    #[serde(default = "default_refill_per_sec")]
    pub refill_per_sec: u32,

    /// Wait for tokens (true) or fail with `RateLimitExhausted` (false)
    #[serde(default = "default_blocking")]
    pub blocking: bool,
}

impl RateLimitConfig {
    /// Validate the limiter settings
    pub fn validate(&self) -> Result<(), crate::Error> {
        if self.capacity == 0 {
            return Err(crate::Error::config("Rate limit capacity must be > 0"));
        }
        if self.refill_per_sec == 0 {
            return Err(crate::Error::config("Rate limit refill rate must be > 0"));
        }
        Ok(())
    }
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            capacity: default_capacity(),
            refill_per_sec: default_refill_per_sec(),
            blocking: default_blocking(),
        }
    }
}

// GoDaddy documents 60 requests per minute per endpoint
fn default_capacity() -> u32 {
    60
}

fn default_refill_per_sec() -> u32 {
    1
}

fn default_blocking() -> bool {
    true
}

/// Retry policy for retryable failures (429, 5xx, network errors)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Retries after the first attempt
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Delay before the first retry (milliseconds)
    #[serde(default = "default_base_backoff_ms")]
    pub base_backoff_ms: u64,

    /// Multiplier applied per retry
    #[serde(default = "default_backoff_factor")]
    pub factor: u32,

    /// Upper bound on a single delay (milliseconds)
    #[serde(default = "default_max_backoff_ms")]
    pub max_backoff_ms: u64,

    /// Relative jitter, 0.2 means ±20%
    #[serde(default = "default_jitter")]
    pub jitter: f64,
}

impl RetryConfig {
    /// Validate the retry policy
    pub fn validate(&self) -> Result<(), crate::Error> {
        if self.factor == 0 {
            return Err(crate::Error::config("Backoff factor must be > 0"));
        }
        if self.max_backoff_ms < self.base_backoff_ms {
            return Err(crate::Error::config(
                "Maximum backoff must not be lower than the base backoff",
            ));
        }
        if !(0.0..1.0).contains(&self.jitter) {
            return Err(crate::Error::config("Jitter must be within [0, 1)"));
        }
        Ok(())
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            base_backoff_ms: default_base_backoff_ms(),
            factor: default_backoff_factor(),
            max_backoff_ms: default_max_backoff_ms(),
            jitter: default_jitter(),
        }
    }
}

fn default_max_retries() -> u32 {
    5
}

fn default_base_backoff_ms() -> u64 {
    500
}

fn default_backoff_factor() -> u32 {
    2
}

fn default_max_backoff_ms() -> u64 {
    30_000
}

fn default_jitter() -> f64 {
    0.2
}

/// Transport settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransportConfig {
    /// Timeout for a single HTTP attempt (seconds)
    #[serde(default = "default_attempt_timeout_secs")]
    pub attempt_timeout_secs: u64,

    /// Optional budget for a whole call including retries (seconds)
    #[serde(default)]
    pub call_deadline_secs: Option<u64>,

    /// Retry policy
    #[serde(default)]
    pub retry: RetryConfig,
}

impl TransportConfig {
    /// Validate the transport settings
    pub fn validate(&self) -> Result<(), crate::Error> {
        if self.attempt_timeout_secs == 0 {
            return Err(crate::Error::config("Attempt timeout must be > 0"));
        }
        if self.call_deadline_secs == Some(0) {
            return Err(crate::Error::config("Call deadline must be > 0 when set"));
        }
        self.retry.validate()
    }

    /// Per-attempt timeout
    pub fn attempt_timeout(&self) -> Duration {
        Duration::from_secs(self.attempt_timeout_secs)
    }

    /// Cumulative call deadline
    pub fn call_deadline(&self) -> Option<Duration> {
        self.call_deadline_secs.map(Duration::from_secs)
    }
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            attempt_timeout_secs: default_attempt_timeout_secs(),
            call_deadline_secs: None,
            retry: RetryConfig::default(),
        }
    }
}

fn default_attempt_timeout_secs() -> u64 {
    30
}

/// Options for one reconciliation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReconcileOptions {
    /// Abort the whole call on any validation failure
    #[serde(default)]
    pub strict: bool,

    /// Delete live keys absent from the desired state
    #[serde(default)]
    pub prune_extraneous: bool,

    /// Worker pool size
    #[serde(default = "default_parallelism")]
    pub parallelism: usize,

    /// Stop scheduling new operations after the first failure
    #[serde(default)]
    pub stop_on_first_error: bool,

    /// Plan only, never mutate
    #[serde(default)]
    pub dry_run: bool,

    /// Stop scheduling new operations after this many seconds
    #[serde(default)]
    pub deadline_secs: Option<u64>,

    /// Write the fetched live zone here before the first mutation
    #[serde(default)]
    pub backup_path: Option<PathBuf>,
}

impl ReconcileOptions {
    /// Validate the options
    pub fn validate(&self) -> Result<(), crate::Error> {
        if self.parallelism == 0 {
            return Err(crate::Error::config("Parallelism must be > 0"));
        }
        Ok(())
    }

    /// Scheduling deadline
    pub fn deadline(&self) -> Option<Duration> {
        self.deadline_secs.map(Duration::from_secs)
    }
}

impl Default for ReconcileOptions {
    fn default() -> Self {
        Self {
            strict: false,
            prune_extraneous: false,
            parallelism: default_parallelism(),
            stop_on_first_error: false,
            dry_run: false,
            deadline_secs: None,
            backup_path: None,
        }
    }
}

fn default_parallelism() -> usize {
    5
}
