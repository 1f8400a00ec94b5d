//! Durable client-side key/value storage

use callscope_core::{Error, Result};
use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Key under which the current organization id is persisted
pub const CURRENT_ORGANIZATION_KEY: &str = "currentOrganizationId";

/// File name used by [`FileStore`] inside its directory
pub const SESSION_FILE_NAME: &str = "session.json";

/// Small string map that survives restarts
///
/// Writes are synchronous; concurrent processes sharing a store are
/// last-write-wins.
pub trait DurableStore: Send + Sync + fmt::Debug {
    /// Value stored under `key`
    fn get(&self, key: &str) -> Result<Option<String>>;

    /// Store `value` under `key`
    fn set(&self, key: &str, value: &str) -> Result<()>;

    /// Forget `key`
    fn remove(&self, key: &str) -> Result<()>;
}

/// Store kept as a JSON object in `<dir>/session.json`
#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
    entries: RwLock<BTreeMap<String, String>>,
}

impl FileStore {
    /// Open the store in `dir`, creating the directory if needed
    ///
    /// # Errors
    ///
    /// Returns a storage error if the directory cannot be created or an
    /// existing file is not a JSON string map.
    pub fn open(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref();
        fs::create_dir_all(dir).map_err(|e| {
            Error::storage(format!("cannot create {}: {e}", dir.display()))
        })?;

        let path = dir.join(SESSION_FILE_NAME);
        let entries = if path.exists() {
            let raw = fs::read_to_string(&path)?;
            if raw.trim().is_empty() {
                BTreeMap::new()
            } else {
                serde_json::from_str(&raw).map_err(|e| {
                    Error::storage(format!("corrupt session file {}: {e}", path.display()))
                })?
            }
        } else {
            BTreeMap::new()
        };

        debug!(path = %path.display(), keys = entries.len(), "opened session store");
        Ok(Self {
            path,
            entries: RwLock::new(entries),
        })
    }

    /// Location of the backing file
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn persist(&self, entries: &BTreeMap<String, String>) -> Result<()> {
        let json = serde_json::to_string_pretty(entries)?;
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, json)
            .and_then(|()| fs::rename(&tmp, &self.path))
            .map_err(|e| Error::storage(format!("cannot write {}: {e}", self.path.display())))
    }
}

impl DurableStore for FileStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.entries.read().get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        let mut entries = self.entries.write();
        entries.insert(key.to_string(), value.to_string());
        self.persist(&entries)
    }

    fn remove(&self, key: &str) -> Result<()> {
        let mut entries = self.entries.write();
        if entries.remove(key).is_some() {
            self.persist(&entries)?;
        }
        Ok(())
    }
}

/// Store that lives only as long as the process
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: RwLock<BTreeMap<String, String>>,
}

impl MemoryStore {
    /// Create an empty store
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store holding one entry
    #[must_use]
    pub fn with_entry(key: &str, value: &str) -> Self {
        let store = Self::new();
        store
            .entries
            .write()
            .insert(key.to_string(), value.to_string());
        store
    }
}

impl DurableStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.entries.read().get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        self.entries
            .write()
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<()> {
        self.entries.write().remove(key);
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tempfile::tempdir;

    #[test]
    fn test_file_store_survives_reopen() {
        let dir = tempdir().unwrap();

        let store = FileStore::open(dir.path()).unwrap();
        store.set(CURRENT_ORGANIZATION_KEY, "org-42").unwrap();
        drop(store);

        let reopened = FileStore::open(dir.path()).unwrap();
        assert_eq!(
            reopened.get(CURRENT_ORGANIZATION_KEY).unwrap().as_deref(),
            Some("org-42")
        );

        let raw = fs::read_to_string(reopened.path()).unwrap();
        assert!(raw.contains("\"currentOrganizationId\": \"org-42\""));
    }

    #[test]
    fn test_file_store_remove() {
        let dir = tempdir().unwrap();
        let store = FileStore::open(dir.path().join("nested")).unwrap();

        store.set("a", "1").unwrap();
        store.remove("a").unwrap();
        store.remove("missing").unwrap();

        let reopened = FileStore::open(dir.path().join("nested")).unwrap();
        assert_eq!(reopened.get("a").unwrap(), None);
    }

    #[test]
    fn test_file_store_rejects_corrupt_file() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join(SESSION_FILE_NAME), "[1, 2").unwrap();

        let err = FileStore::open(dir.path()).unwrap_err();
        assert!(matches!(err, Error::Storage { .. }));
    }

    #[test]
    fn test_memory_store() {
        let store = MemoryStore::with_entry(CURRENT_ORGANIZATION_KEY, "org-1");
        assert_eq!(
            store.get(CURRENT_ORGANIZATION_KEY).unwrap().as_deref(),
            Some("org-1")
        );

        store.set(CURRENT_ORGANIZATION_KEY, "org-2").unwrap();
        store.remove("other").unwrap();
        assert_eq!(
            store.get(CURRENT_ORGANIZATION_KEY).unwrap().as_deref(),
            Some("org-2")
        );
    }
}
