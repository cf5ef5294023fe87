//! On-disk key-value store for daybook
//!
//! All entries live in one JSON object file (by default
//! `<data_dir>/daybook/store.json`):
//!
//! ```text
//! {
//!   "profiles": "[\"Default\",\"Home\"]",
//!   "selected_profile": "Home",
//!   "tasks_2026-10-16": "[{...}]",
//!   "tasks_Home_2026-10-16": "[{...}]"
//! }
//! ```
//!
//! Every access takes an exclusive lock on `store.json.lock`; writes go
//! through temp file + rename so readers never observe a partial file.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use async_trait::async_trait;

use crate::error::{Error, Result};
use crate::kv::KeyValueStore;
use crate::lock::{self, FileLock, DEFAULT_LOCK_TIMEOUT_MS};

/// File name of the store inside the data directory
pub const STORE_FILE: &str = "store.json";

/// JSON-file backed [`KeyValueStore`]
#[derive(Debug, Clone)]
pub struct FileStore {
    path: PathBuf,
    lock_timeout_ms: u64,
}

impl FileStore {
    /// Open (lazily) a store at `path`. The file is created on first write.
    pub fn open(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock_timeout_ms: DEFAULT_LOCK_TIMEOUT_MS,
        }
    }

    /// Override the lock wait (mostly for tests).
    pub fn with_lock_timeout(mut self, timeout_ms: u64) -> Self {
        self.lock_timeout_ms = timeout_ms;
        self
    }

    /// Path to the backing JSON file
    pub fn path(&self) -> &Path {
        &self.path
    }

    // =========================================================================
    // Blocking helpers (run on the blocking pool)
    // =========================================================================

    fn read_map(path: &Path) -> Result<BTreeMap<String, String>> {
        if !path.exists() {
            return Ok(BTreeMap::new());
        }
        let content = fs::read_to_string(path)?;
        if content.trim().is_empty() {
            return Ok(BTreeMap::new());
        }
        let map: BTreeMap<String, String> = serde_json::from_str(&content)?;
        Ok(map)
    }

    fn write_map(path: &Path, map: &BTreeMap<String, String>) -> Result<()> {
        let json = serde_json::to_string_pretty(map)?;
        lock::write_atomic(path, json.as_bytes())
    }

    /// Run `f` against the locked map; persist when it reports a change.
    async fn with_locked_map<T, F>(&self, f: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&mut BTreeMap<String, String>) -> (T, bool) + Send + 'static,
    {
        let path = self.path.clone();
        let timeout = self.lock_timeout_ms;
        tokio::task::spawn_blocking(move || {
            let _lock = FileLock::acquire(lock::lock_path_for(&path), timeout)?;
            let mut map = Self::read_map(&path)?;
            let (value, changed) = f(&mut map);
            if changed {
                Self::write_map(&path, &map)?;
            }
            Ok(value)
        })
        .await
        .map_err(|err| Error::OperationFailed(format!("store task panicked: {err}")))?
    }
}

#[async_trait]
impl KeyValueStore for FileStore {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        let key = key.to_string();
        self.with_locked_map(move |map| (map.get(&key).cloned(), false))
            .await
    }

    async fn set(&self, key: &str, value: &str) -> Result<()> {
        let key = key.to_string();
        let value = value.to_string();
        self.with_locked_map(move |map| {
            let changed = map.get(&key) != Some(&value);
            map.insert(key, value);
            ((), changed)
        })
        .await
    }

    async fn delete(&self, key: &str) -> Result<()> {
        let key = key.to_string();
        self.with_locked_map(move |map| {
            let changed = map.remove(&key).is_some();
            ((), changed)
        })
        .await
    }

    async fn list_all(&self) -> Result<BTreeMap<String, String>> {
        self.with_locked_map(|map| (map.clone(), false)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn missing_file_is_empty_store() {
        let temp = TempDir::new().unwrap();
        let store = FileStore::open(temp.path().join(STORE_FILE));
        assert!(store.list_all().await.unwrap().is_empty());
        assert_eq!(store.get("profiles").await.unwrap(), None);
        assert!(!store.path().exists());
    }

    #[tokio::test]
    async fn values_survive_reopen() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("data").join(STORE_FILE);

        let store = FileStore::open(&path);
        store.set("tasks_2026-01-02", "[]").await.unwrap();
        store.set("selected_profile", "Home").await.unwrap();
        store.delete("selected_profile").await.unwrap();

        let reopened = FileStore::open(&path);
        let all = reopened.list_all().await.unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all.get("tasks_2026-01-02").map(String::as_str), Some("[]"));
    }

    #[tokio::test]
    async fn corrupt_store_file_is_an_error() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join(STORE_FILE);
        fs::write(&path, "not json").unwrap();

        let store = FileStore::open(&path);
        let err = store.get("anything").await.unwrap_err();
        assert!(matches!(err, Error::Json(_)));
    }

    #[tokio::test]
    async fn held_lock_times_out() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join(STORE_FILE);
        let _held = FileLock::acquire(lock::lock_path_for(&path), 1000).unwrap();

        let store = FileStore::open(&path).with_lock_timeout(30);
        let err = store.set("k", "v").await.unwrap_err();
        assert!(matches!(err, Error::LockFailed(_)));
    }
}
