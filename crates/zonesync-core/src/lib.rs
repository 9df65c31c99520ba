// # zonesync-core
//
// Core library for reconciling declared DNS record sets against a
// provider's authoritative records.
//
// ## Architecture Overview
//
// Leaves first:
// - **RateLimiter**: token bucket per credential profile
// - **Transport**: authenticated HTTP calls with retry, backoff and error
//   classification over an abstract `HttpBackend`
// - **validator**: pure record checks, run before any network call
// - **Reconciler**: diffs desired against live state and applies the
//   resulting operations through a bounded worker pool
// - **ProviderRegistry**: plugin-based construction of `DnsProvider`s
//
// ## Design Principles
//
// 1. **Explicit configuration**: every setting is passed through
//    constructors; there is no global state
// 2. **Replace whole sets**: operations always carry the full array for a
//    `(name, type)` key, matching the provider's atomic replace
// 3. **Isolated failures**: one key failing never affects another
// 4. **Idempotency**: re-running an unchanged desired state plans nothing

pub mod config;
pub mod credentials;
pub mod error;
pub mod ratelimit;
pub mod reconcile;
pub mod record;
pub mod registry;
pub mod traits;
pub mod transport;
pub mod validator;

// Re-export core types for convenience
pub use config::{
    Environment, ProviderConfig, RateLimitConfig, ReconcileOptions, RetryConfig, SyncConfig,
    TransportConfig,
};
pub use credentials::{EnvCredentialStore, MemoryCredentialStore};
pub use error::{Error, ErrorKind, FailureReason, InvalidEntry, Result, ValidationError};
pub use ratelimit::{RateLimiter, RateLimiters};
pub use reconcile::{
    plan, BulkResult, FailedKey, HaltReason, Operation, OperationKind, Reconciler, SyncEvent,
    ZoneSnapshot,
};
pub use record::{DesiredState, LiveState, Record, RecordKey, RecordSet, RecordType};
pub use registry::{ProviderContext, ProviderRegistry};
pub use traits::{CredentialProvider, Credentials, DnsProvider, DnsProviderFactory};
pub use transport::{BackendError, HttpBackend, HttpRequest, HttpResponse, Method, Transport};
