// # Credential Provider Trait
//
// The transport needs a key/secret pair per credential profile. Where those
// come from (environment, keyring, a config file) is up to the
// implementation; see `crate::credentials` for the bundled stores.

use async_trait::async_trait;
use std::fmt;

/// API key and secret for one profile
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    /// API key
    pub key: String,
    /// API secret
    pub secret: String,
}

impl Credentials {
    /// Create a credential pair
    pub fn new(key: impl Into<String>, secret: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            secret: secret.into(),
        }
    }

    /// The two static headers sent with every request
    pub fn auth_headers(&self) -> Vec<(String, String)> {
        vec![
            (
                "Authorization".to_string(),
                format!("sso-key {}:{}", self.key, self.secret),
            ),
            ("Accept".to_string(), "application/json".to_string()),
        ]
    }

    /// Whether both halves are non-empty
    pub fn is_complete(&self) -> bool {
        !self.key.trim().is_empty() && !self.secret.trim().is_empty()
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("key", &"<REDACTED>")
            .field("secret", &"<REDACTED>")
            .finish()
    }
}

/// Source of credentials by profile name
#[async_trait]
pub trait CredentialProvider: Send + Sync {
    /// Look up the credentials of `profile`
    ///
    /// A missing or incomplete profile is an `Error::Authentication`.
    async fn get_credentials(&self, profile: &str) -> Result<Credentials, crate::Error>;
}
