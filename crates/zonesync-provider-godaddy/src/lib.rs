// # GoDaddy DNS Provider
//
// Maps record-set operations onto the GoDaddy domains API (v1):
//
// - list:    GET    /v1/domains/{domain}/records
// - create:  PATCH  /v1/domains/{domain}/records
// - replace: PUT    /v1/domains/{domain}/records/{type}/{name}
// - delete:  DELETE /v1/domains/{domain}/records/{type}/{name}
//
// Every call goes through the core `Transport`, which owns authentication,
// rate limiting, retries and status classification. This crate makes one
// `Transport::execute` per operation and never retries on its own.
//
// ## Security
//
// The API key and secret are never stored here; the transport fetches them
// from the credential provider per call and never logs them.

pub mod backend;

pub use backend::ReqwestBackend;

use async_trait::async_trait;
use std::sync::Arc;
use zonesync_core::config::{Environment, ProviderConfig};
use zonesync_core::registry::ProviderContext;
use zonesync_core::transport::{HttpBackend, Method, Transport};
use zonesync_core::{DnsProvider, DnsProviderFactory, Error, Record, RecordKey, Result};

/// Production API base URL
pub const PRODUCTION_BASE_URL: &str = "https://api.godaddy.com";

/// OTE (test environment) API base URL
pub const OTE_BASE_URL: &str = "https://api.ote-godaddy.com";

/// Base URL of an environment
pub fn base_url_for(environment: Environment) -> &'static str {
    match environment {
        Environment::Production => PRODUCTION_BASE_URL,
        Environment::Ote => OTE_BASE_URL,
    }
}

/// GoDaddy DNS provider
#[derive(Debug)]
pub struct GoDaddyProvider {
    transport: Transport,
}

impl GoDaddyProvider {
    /// Create a provider over a configured transport
    pub fn new(transport: Transport) -> Self {
        Self { transport }
    }

    fn records_path(domain: &str) -> String {
        format!("/v1/domains/{}/records", domain)
    }

    fn record_set_path(domain: &str, key: &RecordKey) -> String {
        format!(
            "/v1/domains/{}/records/{}/{}",
            domain, key.record_type, key.name
        )
    }

    /// Request body for a record array
    ///
    /// Companion fields are only sent for the types that use them.
    fn body(records: &[Record]) -> Result<serde_json::Value> {
        let wire: Vec<Record> = records.iter().map(Record::wire_form).collect();
        Ok(serde_json::to_value(wire)?)
    }
}

#[async_trait]
impl DnsProvider for GoDaddyProvider {
    async fn list_records(&self, domain: &str) -> Result<Vec<Record>> {
        let records: Vec<Record> = self
            .transport
            .execute_json(Method::Get, &Self::records_path(domain), None)
            .await?;
        tracing::debug!("GoDaddy returned {} record(s) for {}", records.len(), domain);
        Ok(records)
    }

    async fn create_record_set(&self, domain: &str, key: &RecordKey, records: &[Record]) -> Result<()> {
        tracing::debug!("Creating {} ({} record(s)) in {}", key, records.len(), domain);
        let body = Self::body(records)?;
        self.transport
            .execute(Method::Patch, &Self::records_path(domain), Some(&body))
            .await?;
        Ok(())
    }

    async fn replace_record_set(&self, domain: &str, key: &RecordKey, records: &[Record]) -> Result<()> {
        tracing::debug!("Replacing {} ({} record(s)) in {}", key, records.len(), domain);
        let body = Self::body(records)?;
        self.transport
            .execute(Method::Put, &Self::record_set_path(domain, key), Some(&body))
            .await?;
        Ok(())
    }

    async fn delete_record_set(&self, domain: &str, key: &RecordKey) -> Result<()> {
        tracing::debug!("Deleting {} in {}", key, domain);
        self.transport
            .execute(Method::Delete, &Self::record_set_path(domain, key), None)
            .await?;
        Ok(())
    }

    fn provider_name(&self) -> &'static str {
        "godaddy"
    }
}

/// Factory for creating GoDaddy providers
///
/// Uses a [`ReqwestBackend`] unless another backend is supplied.
#[derive(Default)]
pub struct GoDaddyFactory {
    backend: Option<Arc<dyn HttpBackend>>,
}

impl GoDaddyFactory {
    /// Factory using the reqwest backend
    pub fn new() -> Self {
        Self::default()
    }

    /// Factory whose providers send through `backend`
    pub fn with_backend(backend: Arc<dyn HttpBackend>) -> Self {
        Self {
            backend: Some(backend),
        }
    }
}

impl DnsProviderFactory for GoDaddyFactory {
    fn create(&self, config: &ProviderConfig, context: &ProviderContext) -> Result<Arc<dyn DnsProvider>> {
        let ProviderConfig::GoDaddy {
            profile,
            environment,
            base_url,
        } = config
        else {
            return Err(Error::config("Invalid config for GoDaddy provider"));
        };

        let backend = match &self.backend {
            Some(backend) => Arc::clone(backend),
            None => Arc::new(ReqwestBackend::new()?),
        };
        let base_url = base_url
            .clone()
            .unwrap_or_else(|| base_url_for(*environment).to_string());
        let limiter = context.rate_limiters.for_profile(profile)?;

        tracing::info!(
            "GoDaddy provider: {} (profile '{}', {:?})",
            base_url,
            profile,
            environment
        );

        let transport = Transport::new(
            backend,
            Arc::clone(&context.credentials),
            profile.clone(),
            limiter,
            base_url,
            context.transport.clone(),
        )?
        .with_shutdown(context.shutdown.clone());

        Ok(Arc::new(GoDaddyProvider::new(transport)))
    }
}

/// Register the GoDaddy provider with a registry
///
/// # Example
///
/// ```rust
/// use zonesync_core::ProviderRegistry;
///
/// let registry = ProviderRegistry::new();
/// zonesync_provider_godaddy::register(&registry);
/// assert!(registry.has_provider("godaddy"));
/// ```
pub fn register(registry: &zonesync_core::ProviderRegistry) {
    registry.register_provider("godaddy", Box::new(GoDaddyFactory::new()));
}

#[cfg(test)]
mod tests {
    use super::*;
    use zonesync_core::{MemoryCredentialStore, RateLimitConfig, RateLimiters, TransportConfig};

    fn context() -> ProviderContext {
        ProviderContext::new(
            Arc::new(MemoryCredentialStore::new()),
            Arc::new(RateLimiters::new(RateLimitConfig::default()).unwrap()),
            TransportConfig::default(),
        )
    }

    #[test]
    fn environment_base_urls() {
        assert_eq!(base_url_for(Environment::Production), "https://api.godaddy.com");
        assert_eq!(base_url_for(Environment::Ote), "https://api.ote-godaddy.com");
    }

    #[test]
    fn paths_use_type_then_name() {
        let key = RecordKey::new("_sip._tcp", "SRV");
        assert_eq!(
            GoDaddyProvider::record_set_path("example.com", &key),
            "/v1/domains/example.com/records/SRV/_sip._tcp"
        );
        assert_eq!(
            GoDaddyProvider::records_path("example.com"),
            "/v1/domains/example.com/records"
        );
    }

    #[test]
    fn body_drops_unused_companion_fields() {
        let records = vec![
            Record::new("www", "A", "1.2.3.4", 600).with_priority(5),
            Record::new("@", "MX", "mail.example.com", 3600).with_priority(10),
        ];
        let body = GoDaddyProvider::body(&records).unwrap();
        assert_eq!(
            body,
            serde_json::json!([
                {"name": "www", "type": "A", "data": "1.2.3.4", "ttl": 600},
                {"name": "@", "type": "MX", "data": "mail.example.com", "ttl": 3600, "priority": 10}
            ])
        );
    }

    #[test]
    fn factory_rejects_foreign_config() {
        let config = ProviderConfig::Custom {
            factory: "other".into(),
            config: serde_json::json!({}),
        };
        let err = GoDaddyFactory::new().create(&config, &context()).err().unwrap();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn registry_builds_godaddy() {
        let registry = zonesync_core::ProviderRegistry::new();
        register(&registry);

        let config = ProviderConfig::GoDaddy {
            profile: "default".into(),
            environment: Environment::Ote,
            base_url: None,
        };
        let provider = registry.create_provider(&config, &context()).unwrap();
        assert_eq!(provider.provider_name(), "godaddy");
    }
}
