// crates/common/src/security.rs
use crate::{Error, Result};
use keyring::Entry;
use std::fmt;
use zeroize::{Zeroize, ZeroizeOnDrop};

const SERVICE_NAME: &str = "com.toomo.ranker";

/// Secret API key, zeroed on drop and redacted in debug output
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct ApiKey(String);

impl ApiKey {
    /// Reject blank keys up front
    pub fn new(raw: impl Into<String>) -> Result<Self> {
        let raw = raw.into();
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(Error::Credentials("API key is empty".to_string()));
        }
        Ok(Self(trimmed.to_string()))
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for ApiKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ApiKey(***)")
    }
}

/// Source of the analysis service key
pub trait CredentialLoader: Send + Sync {
    fn load(&self) -> Result<ApiKey>;

    fn describe(&self) -> String;
}

/// Reads the key from a process environment variable
pub struct EnvCredentialLoader {
    var: String,
}

impl EnvCredentialLoader {
    pub fn new(var: impl Into<String>) -> Self {
        Self { var: var.into() }
    }
}

impl CredentialLoader for EnvCredentialLoader {
    fn load(&self) -> Result<ApiKey> {
        let raw = std::env::var(&self.var)
            .map_err(|_| Error::Credentials(format!("{} not set", self.var)))?;
        ApiKey::new(raw)
    }

    fn describe(&self) -> String {
        format!("env:{}", self.var)
    }
}

/// Key persisted in the OS keychain
pub struct KeyringCredentialStore {
    account: String,
}

impl KeyringCredentialStore {
    pub fn new(account: impl Into<String>) -> Self {
        Self {
            account: account.into(),
        }
    }

    /// Keychain slot paired with an environment variable name
    pub fn for_env_var(env_var: &str) -> Self {
        Self::new(env_var.to_ascii_lowercase())
    }

    fn entry(&self) -> Result<Entry> {
        Entry::new(SERVICE_NAME, &self.account)
            .map_err(|e| Error::Internal(format!("Keychain init: {:?}", e)))
    }

    pub fn save(&self, key: &ApiKey) -> Result<()> {
        self.entry()?
            .set_password(key.expose())
            .map_err(|e| Error::Internal(format!("Failed to save key: {:?}", e)))?;
        tracing::info!("API key saved to keychain ({})", self.account);
        Ok(())
    }
}

impl CredentialLoader for KeyringCredentialStore {
    fn load(&self) -> Result<ApiKey> {
        let raw = self
            .entry()?
            .get_password()
            .map_err(|e| Error::Credentials(format!("Keychain entry {}: {:?}", self.account, e)))?;
        ApiKey::new(raw)
    }

    fn describe(&self) -> String {
        format!("keychain:{}", self.account)
    }
}

/// Tries each loader in order; first key found wins
pub struct ChainedCredentialLoader {
    loaders: Vec<Box<dyn CredentialLoader>>,
}

impl ChainedCredentialLoader {
    pub fn new(loaders: Vec<Box<dyn CredentialLoader>>) -> Self {
        Self { loaders }
    }

    /// Environment first, then keychain
    pub fn standard(env_var: &str) -> Self {
        Self::new(vec![
            Box::new(EnvCredentialLoader::new(env_var)),
            Box::new(KeyringCredentialStore::for_env_var(env_var)),
        ])
    }
}

impl CredentialLoader for ChainedCredentialLoader {
    fn load(&self) -> Result<ApiKey> {
        let mut tried = Vec::with_capacity(self.loaders.len());
        for loader in &self.loaders {
            match loader.load() {
                Ok(key) => {
                    tracing::debug!("API key loaded from {}", loader.describe());
                    return Ok(key);
                }
                Err(e) => {
                    tracing::debug!("No API key from {}: {}", loader.describe(), e);
                    tried.push(loader.describe());
                }
            }
        }
        Err(Error::Credentials(format!(
            "no API key found (tried {})",
            tried.join(", ")
        )))
    }

    fn describe(&self) -> String {
        let parts: Vec<String> = self.loaders.iter().map(|l| l.describe()).collect();
        parts.join(" -> ")
    }
}
