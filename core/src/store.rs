//! Key/value storage backing the query and editor endpoints.
//!
//! Entries live in a single JSON object on disk (`{"key": "value", ...}`).
//! Reads go straight to the file; writes are serialised behind one async lock
//! and land via write-to-temp plus rename, so a concurrent reader sees either
//! the old file or the new one.

use crate::{MockStreamError, Result};
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;
use tracing::{debug, info};

/// All entries, ordered by key.
pub type Entries = BTreeMap<String, String>;

/// Storage interface consumed by the HTTP layer.
///
/// Query delivery only ever calls [`ValueStore::lookup`]; the remaining
/// operations serve the editor.
#[async_trait]
pub trait ValueStore: Send + Sync {
    /// Fetch the value stored under `key`.
    async fn lookup(&self, key: &str) -> Result<Option<String>>;

    /// Snapshot of every entry.
    async fn entries(&self) -> Result<Entries>;

    /// Insert or overwrite an entry.
    async fn insert(&self, key: &str, value: &str) -> Result<()>;

    /// Overwrite an existing entry. Returns `false` if the key is absent.
    async fn update(&self, key: &str, value: &str) -> Result<bool>;

    /// Delete an entry. Returns `false` if the key is absent.
    async fn remove(&self, key: &str) -> Result<bool>;
}

/// [`ValueStore`] over one JSON file.
///
/// A missing file reads as an empty store and is created on first write.
pub struct JsonFileStore {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl JsonFileStore {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        let path = path.as_ref().to_path_buf();
        info!(target: "store", path = %path.display(), "JSON store initialized");
        Self {
            path,
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn load(&self) -> Result<Entries> {
        let raw = match tokio::fs::read_to_string(&self.path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Entries::new()),
            Err(e) => return Err(self.unavailable(e)),
        };
        serde_json::from_str(&raw).map_err(|e| self.unavailable(e))
    }

    async fn persist(&self, entries: &Entries) -> Result<()> {
        let body = serde_json::to_string_pretty(entries)?;
        let tmp = self.temp_path();
        tokio::fs::write(&tmp, body)
            .await
            .map_err(|e| self.unavailable(e))?;
        tokio::fs::rename(&tmp, &self.path)
            .await
            .map_err(|e| self.unavailable(e))?;
        debug!(target: "store", entries = entries.len(), "Store persisted");
        Ok(())
    }

    /// Run one read-modify-write cycle under the write lock.
    ///
    /// `apply` returns whether it changed anything; unchanged maps are not
    /// written back.
    async fn modify<F>(&self, apply: F) -> Result<bool>
    where
        F: FnOnce(&mut Entries) -> bool + Send,
    {
        let _guard = self.write_lock.lock().await;
        let mut entries = self.load().await?;
        let changed = apply(&mut entries);
        if changed {
            self.persist(&entries).await?;
        }
        Ok(changed)
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self.path.clone().into_os_string();
        name.push(".tmp");
        PathBuf::from(name)
    }

    fn unavailable(&self, err: impl std::fmt::Display) -> MockStreamError {
        MockStreamError::StoreUnavailable(format!("{}: {}", self.path.display(), err))
    }
}

#[async_trait]
impl ValueStore for JsonFileStore {
    async fn lookup(&self, key: &str) -> Result<Option<String>> {
        let mut entries = self.load().await?;
        Ok(entries.remove(key))
    }

    async fn entries(&self) -> Result<Entries> {
        self.load().await
    }

    async fn insert(&self, key: &str, value: &str) -> Result<()> {
        self.modify(|entries| {
            entries.insert(key.to_string(), value.to_string());
            true
        })
        .await?;
        Ok(())
    }

    async fn update(&self, key: &str, value: &str) -> Result<bool> {
        self.modify(|entries| match entries.get_mut(key) {
            Some(slot) => {
                *slot = value.to_string();
                true
            }
            None => false,
        })
        .await
    }

    async fn remove(&self, key: &str) -> Result<bool> {
        self.modify(|entries| entries.remove(key).is_some()).await
    }
}
