//! Core traits for zonesync
//!
//! This module defines the abstract interfaces that implementations must follow.
//!
//! - [`DnsProvider`]: Read and replace record sets via a provider API
//! - [`CredentialProvider`]: Look up API credentials by profile

pub mod credentials;
pub mod dns_provider;

pub use credentials::{CredentialProvider, Credentials};
pub use dns_provider::{DnsProvider, DnsProviderFactory};
