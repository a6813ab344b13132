use anyhow::{Context, Result};
use keyring::Entry;
use tracing::debug;

use super::store::{Credentials, TokenStore};

const SERVICE_NAME: &str = "pagepulse";

/// Keychain entry holding the access token
const ACCESS_KEY: &str = "token";

/// Keychain entry holding the refresh token
const REFRESH_KEY: &str = "refresh";

/// Credentials kept in the OS keychain.
pub struct KeyringTokenStore {
    service: String,
}

impl KeyringTokenStore {
    pub fn new() -> Self {
        Self::with_service(SERVICE_NAME)
    }

    /// Use a different keychain service name (one per API base, for example)
    pub fn with_service(service: impl Into<String>) -> Self {
        Self {
            service: service.into(),
        }
    }

    fn entry(&self, key: &str) -> Result<Entry> {
        Entry::new(&self.service, key).context("Failed to create keyring entry")
    }

    fn read(&self, key: &str) -> Option<String> {
        match self.entry(key).and_then(|e| {
            e.get_password()
                .context("Failed to retrieve secret from keychain")
        }) {
            Ok(secret) => Some(secret),
            Err(e) => {
                debug!(key, error = %e, "No keychain secret");
                None
            }
        }
    }

    fn delete(&self, key: &str) -> Result<()> {
        match self.entry(key)?.delete_credential() {
            Ok(()) | Err(keyring::Error::NoEntry) => Ok(()),
            Err(e) => Err(e).context("Failed to delete credential from keychain"),
        }
    }
}

impl Default for KeyringTokenStore {
    fn default() -> Self {
        Self::new()
    }
}

impl TokenStore for KeyringTokenStore {
    fn credentials(&self) -> Option<Credentials> {
        let access_token = self.read(ACCESS_KEY)?;
        Some(Credentials::new(access_token, self.read(REFRESH_KEY)))
    }

    fn save(&self, credentials: &Credentials) -> Result<()> {
        self.entry(ACCESS_KEY)?
            .set_password(&credentials.access_token)
            .context("Failed to store access token in keychain")?;
        match credentials.refresh_token {
            Some(ref refresh) => self
                .entry(REFRESH_KEY)?
                .set_password(refresh)
                .context("Failed to store refresh token in keychain")?,
            None => self.delete(REFRESH_KEY)?,
        }
        Ok(())
    }

    fn clear(&self) -> Result<()> {
        self.delete(ACCESS_KEY)?;
        self.delete(REFRESH_KEY)
    }
}
