use std::path::{Path, PathBuf};
use std::sync::{PoisonError, RwLock};

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::store::{Credentials, TokenStore};

/// Session file name in cache directory
const SESSION_FILE: &str = "session.json";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionData {
    #[serde(flatten)]
    pub credentials: Credentials,
    pub updated_at: DateTime<Utc>,
}

/// Credentials persisted as JSON in the cache directory.
///
/// The file is read once when the store is opened; every write goes through
/// to disk before the in-memory copy is updated.
pub struct FileTokenStore {
    path: PathBuf,
    data: RwLock<Option<SessionData>>,
}

impl FileTokenStore {
    /// Open the session file in `cache_dir`, loading it if it exists
    pub fn open(cache_dir: &Path) -> Self {
        let path = cache_dir.join(SESSION_FILE);
        let data = match Self::load(&path) {
            Ok(data) => data,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Ignoring unreadable session file");
                None
            }
        };
        Self {
            path,
            data: RwLock::new(data),
        }
    }

    fn load(path: &Path) -> Result<Option<SessionData>> {
        if !path.exists() {
            return Ok(None);
        }
        let contents = std::fs::read_to_string(path).context("Failed to read session file")?;
        let data: SessionData =
            serde_json::from_str(&contents).context("Failed to parse session file")?;
        debug!(path = %path.display(), "Loaded session");
        Ok(Some(data))
    }

    /// When the stored credentials were last written
    pub fn updated_at(&self) -> Option<DateTime<Utc>> {
        self.data
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .map(|d| d.updated_at)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl TokenStore for FileTokenStore {
    fn credentials(&self) -> Option<Credentials> {
        self.data
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .map(|d| d.credentials.clone())
    }

    fn save(&self, credentials: &Credentials) -> Result<()> {
        let data = SessionData {
            credentials: credentials.clone(),
            updated_at: Utc::now(),
        };
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent).context("Failed to create session directory")?;
        }
        let contents = serde_json::to_string_pretty(&data)?;
        std::fs::write(&self.path, contents).context("Failed to write session file")?;

        *self.data.write().unwrap_or_else(PoisonError::into_inner) = Some(data);
        Ok(())
    }

    fn clear(&self) -> Result<()> {
        *self.data.write().unwrap_or_else(PoisonError::into_inner) = None;
        if self.path.exists() {
            std::fs::remove_file(&self.path).context("Failed to remove session file")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_store_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileTokenStore::open(dir.path());
        assert!(store.credentials().is_none());
        assert!(store.updated_at().is_none());

        store
            .save(&Credentials::new("access-1", Some("refresh-1".to_string())))
            .unwrap();

        let reopened = FileTokenStore::open(dir.path());
        assert_eq!(reopened.access_token().as_deref(), Some("access-1"));
        assert_eq!(reopened.refresh_token().as_deref(), Some("refresh-1"));
        assert!(reopened.updated_at().is_some());
    }

    #[test]
    fn test_file_uses_token_and_refresh_keys() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileTokenStore::open(dir.path());
        store
            .save(&Credentials::new("a", Some("r".to_string())))
            .unwrap();

        let raw = std::fs::read_to_string(store.path()).unwrap();
        let json: serde_json::Value = serde_json::from_str(&raw).unwrap();
        assert_eq!(json["token"], "a");
        assert_eq!(json["refresh"], "r");
    }

    #[test]
    fn test_clear_removes_file() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileTokenStore::open(dir.path());
        store.save(&Credentials::new("a", None)).unwrap();
        assert!(store.path().exists());

        store.clear().unwrap();
        assert!(!store.path().exists());
        assert!(store.credentials().is_none());

        // Clearing twice is fine
        store.clear().unwrap();
    }

    #[test]
    fn test_corrupt_file_reads_as_logged_out() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(SESSION_FILE), "not json").unwrap();

        let store = FileTokenStore::open(dir.path());
        assert!(store.credentials().is_none());
    }
}
