// # Environment Credential Store
//
// Reads credentials from environment variables:
//
// - `ZONESYNC_<PROFILE>_API_KEY` / `ZONESYNC_<PROFILE>_API_SECRET`
// - falling back to `ZONESYNC_API_KEY` / `ZONESYNC_API_SECRET`
//
// `<PROFILE>` is the profile name upper-cased with every non-alphanumeric
// character replaced by `_`.

use async_trait::async_trait;
use std::sync::Arc;

use crate::traits::credentials::{CredentialProvider, Credentials};
use crate::Error;

type Lookup = Arc<dyn Fn(&str) -> Option<String> + Send + Sync>;

/// Credential store backed by environment variables
#[derive(Clone)]
pub struct EnvCredentialStore {
    prefix: String,
    lookup: Lookup,
}

impl EnvCredentialStore {
    /// Read from the process environment with the `ZONESYNC` prefix
    pub fn new() -> Self {
        Self::with_lookup(|name| std::env::var(name).ok())
    }

    /// Read through a custom lookup function (tests, embedders)
    pub fn with_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String> + Send + Sync + 'static,
    {
        Self {
            prefix: "ZONESYNC".to_string(),
            lookup: Arc::new(lookup),
        }
    }

    fn var(&self, name: &str) -> Option<String> {
        (self.lookup)(name).filter(|v| !v.trim().is_empty())
    }

    fn profile_vars(&self, profile: &str) -> (String, String) {
        let scoped: String = profile
            .chars()
            .map(|c| {
                if c.is_ascii_alphanumeric() {
                    c.to_ascii_uppercase()
                } else {
                    '_'
                }
            })
            .collect();
        (
            format!("{}_{}_API_KEY", self.prefix, scoped),
            format!("{}_{}_API_SECRET", self.prefix, scoped),
        )
    }
}

impl Default for EnvCredentialStore {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for EnvCredentialStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EnvCredentialStore")
            .field("prefix", &self.prefix)
            .finish()
    }
}

#[async_trait]
impl CredentialProvider for EnvCredentialStore {
    async fn get_credentials(&self, profile: &str) -> Result<Credentials, Error> {
        let (key_var, secret_var) = self.profile_vars(profile);
        if let (Some(key), Some(secret)) = (self.var(&key_var), self.var(&secret_var)) {
            return Ok(Credentials::new(key, secret));
        }

        let key_var = format!("{}_API_KEY", self.prefix);
        let secret_var = format!("{}_API_SECRET", self.prefix);
        match (self.var(&key_var), self.var(&secret_var)) {
            (Some(key), Some(secret)) => Ok(Credentials::new(key, secret)),
            _ => Err(Error::auth(format!(
                "No credentials for profile '{}' (set {} and {})",
                profile, key_var, secret_var
            ))),
        }
    }
}
