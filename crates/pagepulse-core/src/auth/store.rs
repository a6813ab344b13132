use std::sync::{PoisonError, RwLock};

use anyhow::Result;
use serde::{Deserialize, Serialize};

/// Access/refresh token pair for one logged-in user.
///
/// Serialized with the short `token` / `refresh` keys the backend and the
/// browser dashboard have always used.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credentials {
    #[serde(rename = "token")]
    pub access_token: String,
    #[serde(rename = "refresh", default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
}

impl Credentials {
    pub fn new(access_token: impl Into<String>, refresh_token: Option<String>) -> Self {
        Self {
            access_token: access_token.into(),
            refresh_token,
        }
    }
}

/// Where the client keeps its session credentials.
///
/// Reads never fail: storage that cannot be read is treated as "not logged in".
/// Writes report errors so a refresh that cannot be persisted is not mistaken
/// for a successful one.
pub trait TokenStore: Send + Sync {
    fn credentials(&self) -> Option<Credentials>;

    fn save(&self, credentials: &Credentials) -> Result<()>;

    fn clear(&self) -> Result<()>;

    /// Replace the access token, keeping whatever refresh token is stored.
    fn set_access_token(&self, access_token: &str) -> Result<()> {
        let refresh_token = self.credentials().and_then(|c| c.refresh_token);
        self.save(&Credentials::new(access_token, refresh_token))
    }

    fn access_token(&self) -> Option<String> {
        self.credentials().map(|c| c.access_token)
    }

    fn refresh_token(&self) -> Option<String> {
        self.credentials().and_then(|c| c.refresh_token)
    }
}

/// Process-local store, used for `--ephemeral` sessions and in tests.
#[derive(Debug, Default)]
pub struct MemoryTokenStore {
    inner: RwLock<Option<Credentials>>,
}

impl MemoryTokenStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_credentials(credentials: Credentials) -> Self {
        Self {
            inner: RwLock::new(Some(credentials)),
        }
    }
}

impl TokenStore for MemoryTokenStore {
    fn credentials(&self) -> Option<Credentials> {
        self.inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn save(&self, credentials: &Credentials) -> Result<()> {
        *self.inner.write().unwrap_or_else(PoisonError::into_inner) = Some(credentials.clone());
        Ok(())
    }

    fn clear(&self) -> Result<()> {
        *self.inner.write().unwrap_or_else(PoisonError::into_inner) = None;
        Ok(())
    }
}
