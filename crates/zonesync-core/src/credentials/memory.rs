// # Memory Credential Store
//
// In-memory implementation of CredentialProvider.
//
// ## When to Use
//
// - Tests
// - Embedders that already hold credentials (loaded from their own keyring
//   or config) and only need to hand them to the transport

use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use async_trait::async_trait;

use crate::traits::credentials::{CredentialProvider, Credentials};
use crate::Error;

/// In-memory credential store
///
/// # Example
///
/// ```rust,no_run
/// use zonesync_core::credentials::MemoryCredentialStore;
/// use zonesync_core::traits::{CredentialProvider, Credentials};
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let store = MemoryCredentialStore::new();
///     store.insert("default", Credentials::new("key", "secret")).await;
///
///     let creds = store.get_credentials("default").await?;
///     assert_eq!(creds.key, "key");
///     Ok(())
/// }
/// ```
#[derive(Debug, Clone, Default)]
pub struct MemoryCredentialStore {
    inner: Arc<RwLock<HashMap<String, Credentials>>>,
}

impl MemoryCredentialStore {
    /// Create a new empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store holding a single profile
    pub fn with_profile(profile: impl Into<String>, credentials: Credentials) -> Self {
        let mut map = HashMap::new();
        map.insert(profile.into(), credentials);
        Self {
            inner: Arc::new(RwLock::new(map)),
        }
    }

    /// Add or replace a profile
    pub async fn insert(&self, profile: impl Into<String>, credentials: Credentials) {
        self.inner.write().await.insert(profile.into(), credentials);
    }

    /// Remove a profile
    pub async fn remove(&self, profile: &str) -> Option<Credentials> {
        self.inner.write().await.remove(profile)
    }

    /// Profile names held by the store
    pub async fn profiles(&self) -> Vec<String> {
        self.inner.read().await.keys().cloned().collect()
    }
}

#[async_trait]
impl CredentialProvider for MemoryCredentialStore {
    async fn get_credentials(&self, profile: &str) -> Result<Credentials, Error> {
        let guard = self.inner.read().await;
        match guard.get(profile) {
            Some(creds) if creds.is_complete() => Ok(creds.clone()),
            Some(_) => Err(Error::auth(format!(
                "Credentials for profile '{}' are incomplete",
                profile
            ))),
            None => Err(Error::auth(format!(
                "No credentials for profile '{}'",
                profile
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[tokio::test]
    async fn test_memory_store_lookup() {
        let store = MemoryCredentialStore::new();
        store.insert("default", Credentials::new("k", "s")).await;

        let creds = store.get_credentials("default").await.unwrap();
        assert_eq!(creds, Credentials::new("k", "s"));
        assert_eq!(store.profiles().await, vec!["default".to_string()]);
    }

    #[tokio::test]
    async fn test_missing_profile_is_auth_error() {
        let store = MemoryCredentialStore::with_profile("prod", Credentials::new("k", "s"));
        let err = store.get_credentials("staging").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Auth);

        store.remove("prod").await;
        assert!(store.get_credentials("prod").await.is_err());
    }

    #[tokio::test]
    async fn test_incomplete_credentials_rejected() {
        let store = MemoryCredentialStore::with_profile("default", Credentials::new("k", ""));
        let err = store.get_credentials("default").await.unwrap_err();
        assert!(err.is_fatal());
    }
}
