use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard};

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

/// Session file name in cache directory
const SESSION_FILE: &str = "session.json";

/// A single slot holding the opaque bearer token.
///
/// Implementations do no validation of their own; expiry and format checks
/// belong to [`SessionGuard`](super::SessionGuard).
pub trait TokenStore: Send + Sync {
    /// Read the stored token, if any
    fn get(&self) -> Result<Option<String>>;

    /// Replace the stored token
    fn set(&self, token: &str) -> Result<()>;

    /// Remove the stored token. Removing an absent token is not an error.
    fn remove(&self) -> Result<()>;
}

/// The slot was read but its contents are unusable.
///
/// Backends return this (through `anyhow`) only when the stored record
/// itself is damaged. Any other `get` error means the slot could not be
/// reached and says nothing about the token.
#[derive(Error, Debug)]
#[error("Stored session record is corrupt: {0}")]
pub struct CorruptRecord(#[source] pub serde_json::Error);

impl<T: TokenStore + ?Sized> TokenStore for Arc<T> {
    fn get(&self) -> Result<Option<String>> {
        (**self).get()
    }

    fn set(&self, token: &str) -> Result<()> {
        (**self).set(token)
    }

    fn remove(&self) -> Result<()> {
        (**self).remove()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredToken {
    pub token: String,
    pub stored_at: DateTime<Utc>,
}

/// Token persisted as JSON in the cache directory.
pub struct FileStore {
    cache_dir: PathBuf,
}

impl FileStore {
    pub fn new(cache_dir: PathBuf) -> Self {
        Self { cache_dir }
    }

    pub fn path(&self) -> PathBuf {
        self.cache_dir.join(SESSION_FILE)
    }

    /// Load the full record, including when it was stored
    pub fn load(&self) -> Result<Option<StoredToken>> {
        let path = self.path();
        if !path.exists() {
            return Ok(None);
        }
        let contents = std::fs::read_to_string(&path)
            .context("Failed to read session file")?;
        let stored: StoredToken = serde_json::from_str(&contents).map_err(CorruptRecord)?;
        Ok(Some(stored))
    }
}

impl TokenStore for FileStore {
    fn get(&self) -> Result<Option<String>> {
        Ok(self.load()?.map(|s| s.token))
    }

    fn set(&self, token: &str) -> Result<()> {
        let path = self.path();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        let stored = StoredToken {
            token: token.to_string(),
            stored_at: Utc::now(),
        };
        let contents = serde_json::to_string_pretty(&stored)?;
        std::fs::write(&path, contents).context("Failed to write session file")?;
        debug!(path = %path.display(), "Stored session token");
        Ok(())
    }

    fn remove(&self) -> Result<()> {
        let path = self.path();
        if path.exists() {
            std::fs::remove_file(&path).context("Failed to remove session file")?;
            debug!(path = %path.display(), "Removed session token");
        }
        Ok(())
    }
}

/// In-process slot. Nothing survives the process.
#[derive(Default)]
pub struct MemoryStore {
    token: Mutex<Option<String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_token(token: impl Into<String>) -> Self {
        Self {
            token: Mutex::new(Some(token.into())),
        }
    }

    fn lock(&self) -> Result<MutexGuard<'_, Option<String>>> {
        self.token
            .lock()
            .map_err(|_| anyhow::anyhow!("Token slot lock poisoned"))
    }
}

impl TokenStore for MemoryStore {
    fn get(&self) -> Result<Option<String>> {
        Ok(self.lock()?.clone())
    }

    fn set(&self, token: &str) -> Result<()> {
        *self.lock()? = Some(token.to_string());
        Ok(())
    }

    fn remove(&self) -> Result<()> {
        *self.lock()? = None;
        Ok(())
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_file_store_empty() {
        let dir = TempDir::new().unwrap();
        let store = FileStore::new(dir.path().to_path_buf());
        assert_eq!(store.get().unwrap(), None);
    }

    #[test]
    fn test_file_store_set_get_remove() {
        let dir = TempDir::new().unwrap();
        // Nested path that does not exist yet
        let store = FileStore::new(dir.path().join("nested").join("cache"));

        store.set("abc.def.ghi").unwrap();
        assert!(store.path().exists());
        assert_eq!(store.get().unwrap().as_deref(), Some("abc.def.ghi"));

        let stored = store.load().unwrap().unwrap();
        assert!(stored.stored_at <= Utc::now());

        store.set("second").unwrap();
        assert_eq!(store.get().unwrap().as_deref(), Some("second"));

        store.remove().unwrap();
        assert!(!store.path().exists());
        assert_eq!(store.get().unwrap(), None);
    }

    #[test]
    fn test_file_store_remove_when_absent() {
        let dir = TempDir::new().unwrap();
        let store = FileStore::new(dir.path().to_path_buf());
        assert!(store.remove().is_ok());
    }

    #[test]
    fn test_file_store_corrupt_file_is_error() {
        let dir = TempDir::new().unwrap();
        let store = FileStore::new(dir.path().to_path_buf());
        std::fs::write(store.path(), "{ not json").unwrap();
        let err = store.get().unwrap_err();
        assert!(err.downcast_ref::<CorruptRecord>().is_some());

        // Still removable so the guard can recover
        store.remove().unwrap();
        assert_eq!(store.get().unwrap(), None);
    }

    #[cfg(unix)]
    #[test]
    fn test_file_store_read_failure_is_not_corrupt() {
        let dir = TempDir::new().unwrap();
        let store = FileStore::new(dir.path().to_path_buf());
        // A directory where the file should be: exists, but cannot be read
        std::fs::create_dir(store.path()).unwrap();
        let err = store.get().unwrap_err();
        assert!(err.downcast_ref::<CorruptRecord>().is_none());
    }

    #[test]
    fn test_memory_store() {
        let store = MemoryStore::new();
        assert_eq!(store.get().unwrap(), None);
        store.set("t").unwrap();
        assert_eq!(store.get().unwrap().as_deref(), Some("t"));
        store.remove().unwrap();
        store.remove().unwrap();
        assert_eq!(store.get().unwrap(), None);

        let seeded = MemoryStore::with_token("seed");
        assert_eq!(seeded.get().unwrap().as_deref(), Some("seed"));
    }
}
