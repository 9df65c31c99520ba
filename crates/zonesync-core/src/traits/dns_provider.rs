// # DNS Provider Trait
//
// Defines the interface the reconciler drives. A provider exposes the four
// record-set calls of a replace-whole-set API:
//
// - list every record of a domain (the live baseline)
// - create a record set that does not exist yet
// - replace the full array of an existing record set
// - delete a record set
//
// ## Implementations
//
// - GoDaddy: `zonesync-provider-godaddy` crate
//
// ## Usage
//
// ```rust,ignore
// use zonesync_core::{DnsProvider, Record, RecordKey};
//
// async fn bump(provider: &dyn DnsProvider) -> zonesync_core::Result<()> {
//     let key = RecordKey::new("www", "A");
//     let records = vec![Record::new("www", "A", "1.2.3.4", 600)];
//     provider.replace_record_set("example.com", &key, &records).await
// }
// ```

use async_trait::async_trait;
use std::sync::Arc;

use crate::record::{Record, RecordKey};

/// Trait for DNS provider implementations
///
/// Every method issues exactly one provider call through the transport.
/// Retry, backoff and rate limiting live in the transport, scheduling and
/// diffing in the reconciler; providers only map calls onto their wire
/// format.
///
/// # Thread Safety
///
/// Implementations must be usable from many worker tasks at once.
#[async_trait]
pub trait DnsProvider: Send + Sync {
    /// Fetch every record of the domain
    async fn list_records(&self, domain: &str) -> Result<Vec<Record>, crate::Error>;

    /// Create the record set for `key` with the given records
    async fn create_record_set(
        &self,
        domain: &str,
        key: &RecordKey,
        records: &[Record],
    ) -> Result<(), crate::Error>;

    /// Replace the full record array for `key`
    ///
    /// The provider swaps the whole array atomically; `records` is always the
    /// complete desired content, never a delta.
    async fn replace_record_set(
        &self,
        domain: &str,
        key: &RecordKey,
        records: &[Record],
    ) -> Result<(), crate::Error>;

    /// Delete every record under `key`
    async fn delete_record_set(&self, domain: &str, key: &RecordKey) -> Result<(), crate::Error>;

    /// Get the provider name (for logging/debugging)
    fn provider_name(&self) -> &'static str;
}

/// Helper trait for constructing DNS providers from configuration
pub trait DnsProviderFactory: Send + Sync {
    /// Create a DnsProvider instance from configuration
    ///
    /// The context carries the shared collaborators (credentials, rate
    /// limiters, transport settings) the provider's transport is built from.
    fn create(
        &self,
        config: &crate::config::ProviderConfig,
        context: &crate::registry::ProviderContext,
    ) -> Result<Arc<dyn DnsProvider>, crate::Error>;
}
