//! Plugin-based provider registry
//!
//! Providers register a factory under their type name; callers then build a
//! provider from configuration without naming the implementation.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use zonesync_core::registry::{ProviderContext, ProviderRegistry};
//!
//! let registry = ProviderRegistry::new();
//! zonesync_provider_godaddy::register(&registry);
//!
//! let context = ProviderContext::new(credentials, rate_limiters, transport_config);
//! let provider = registry.create_provider(&config.provider, &context)?;
//! ```

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};
use tokio_util::sync::CancellationToken;

use crate::config::{ProviderConfig, TransportConfig};
use crate::error::{Error, Result};
use crate::ratelimit::RateLimiters;
use crate::traits::{CredentialProvider, DnsProvider, DnsProviderFactory};

/// Shared collaborators handed to every provider factory
#[derive(Clone)]
pub struct ProviderContext {
    /// Credential lookup
    pub credentials: Arc<dyn CredentialProvider>,
    /// Per-profile rate limiters
    pub rate_limiters: Arc<RateLimiters>,
    /// Transport settings
    pub transport: TransportConfig,
    /// Cancelled on process shutdown; transports stop retrying
    pub shutdown: CancellationToken,
}

impl ProviderContext {
    /// Create a context with a fresh shutdown token
    pub fn new(
        credentials: Arc<dyn CredentialProvider>,
        rate_limiters: Arc<RateLimiters>,
        transport: TransportConfig,
    ) -> Self {
        Self {
            credentials,
            rate_limiters,
            transport,
            shutdown: CancellationToken::new(),
        }
    }

    /// Use an existing shutdown token
    pub fn with_shutdown(mut self, shutdown: CancellationToken) -> Self {
        self.shutdown = shutdown;
        self
    }
}

impl std::fmt::Debug for ProviderContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderContext")
            .field("rate_limiters", &self.rate_limiters)
            .field("transport", &self.transport)
            .finish()
    }
}

/// Provider registry
///
/// The registry uses interior mutability with RwLock, allowing concurrent
/// reads and exclusive writes.
#[derive(Default)]
pub struct ProviderRegistry {
    providers: RwLock<HashMap<String, Box<dyn DnsProviderFactory>>>,
}

impl ProviderRegistry {
    /// Create a new empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a DNS provider factory under `name`
    ///
    /// Registering the same name twice replaces the earlier factory.
    pub fn register_provider(&self, name: impl Into<String>, factory: Box<dyn DnsProviderFactory>) {
        let name = name.into();
        let mut providers = self.providers.write().unwrap_or_else(PoisonError::into_inner);
        providers.insert(name, factory);
    }

    /// Create a DNS provider from configuration
    ///
    /// Fails with a configuration error when the type is not registered or
    /// the configuration does not validate.
    pub fn create_provider(
        &self,
        config: &ProviderConfig,
        context: &ProviderContext,
    ) -> Result<Arc<dyn DnsProvider>> {
        config.validate()?;
        let provider_type = config.type_name();
        let providers = self.providers.read().unwrap_or_else(PoisonError::into_inner);

        let factory = providers
            .get(provider_type)
            .ok_or_else(|| Error::config(format!("Unknown provider type: {}", provider_type)))?;

        factory.create(config, context)
    }

    /// List all registered provider types
    pub fn list_providers(&self) -> Vec<String> {
        let providers = self.providers.read().unwrap_or_else(PoisonError::into_inner);
        let mut names: Vec<String> = providers.keys().cloned().collect();
        names.sort();
        names
    }

    /// Check if a provider type is registered
    pub fn has_provider(&self, name: &str) -> bool {
        let providers = self.providers.read().unwrap_or_else(PoisonError::into_inner);
        providers.contains_key(name)
    }
}
