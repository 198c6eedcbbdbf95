//! Durable Store Backends
//!
//! The string key-value contract the durable cache persists through, with an
//! in-process implementation and a JSON-file implementation.

use std::collections::BTreeMap;
use std::fmt::Debug;
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{CacheError, Result};

// == Key Value Store ==
/// Persistent string-to-string store, shaped like browser local storage.
pub trait KeyValueStore: Debug + Send + Sync {
    /// Reads a raw value.
    fn get_item(&self, key: &str) -> Result<Option<String>>;

    /// Writes a raw value, replacing any previous one.
    fn set_item(&mut self, key: &str, value: String) -> Result<()>;

    /// Removes a value. Removing a missing key is not an error.
    fn remove_item(&mut self, key: &str) -> Result<()>;

    /// Removes several values at once.
    ///
    /// Stores that persist on every mutation override this to persist once.
    fn remove_items(&mut self, keys: &[String]) -> Result<()> {
        for key in keys {
            self.remove_item(key)?;
        }
        Ok(())
    }

    /// Lists every key in the store, whatever its namespace.
    fn keys(&self) -> Result<Vec<String>>;
}

// == Memory Store ==
/// In-process store, optionally limited to a byte quota.
///
/// Usage is counted as the sum of key and value lengths.
#[derive(Debug, Default)]
pub struct MemoryStore {
    items: BTreeMap<String, String>,
    quota: Option<usize>,
}

impl MemoryStore {
    /// Creates an unbounded store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a store that rejects writes beyond `quota_bytes`.
    pub fn with_quota(quota_bytes: usize) -> Self {
        Self {
            items: BTreeMap::new(),
            quota: Some(quota_bytes),
        }
    }

    /// Bytes currently used.
    pub fn used_bytes(&self) -> usize {
        self.items.iter().map(|(k, v)| k.len() + v.len()).sum()
    }
}

impl KeyValueStore for MemoryStore {
    fn get_item(&self, key: &str) -> Result<Option<String>> {
        Ok(self.items.get(key).cloned())
    }

    fn set_item(&mut self, key: &str, value: String) -> Result<()> {
        if let Some(quota) = self.quota {
            let replaced = self.items.get(key).map_or(0, |old| key.len() + old.len());
            let used = self.used_bytes() - replaced;
            let needed = key.len() + value.len();
            let available = quota.saturating_sub(used);
            if needed > available {
                return Err(CacheError::QuotaExceeded { needed, available });
            }
        }
        self.items.insert(key.to_string(), value);
        Ok(())
    }

    fn remove_item(&mut self, key: &str) -> Result<()> {
        self.items.remove(key);
        Ok(())
    }

    fn keys(&self) -> Result<Vec<String>> {
        Ok(self.items.keys().cloned().collect())
    }
}

// == File Store ==
/// Store kept in one JSON object file on disk.
///
/// The whole map is loaded on open and rewritten on every mutation through a
/// temporary file and a rename, so a crash never leaves a half-written file.
#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
    items: BTreeMap<String, String>,
}

impl FileStore {
    /// Opens the store at `path`, starting empty if the file does not exist.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let items = if path.exists() {
            let raw = fs::read_to_string(&path)?;
            if raw.trim().is_empty() {
                BTreeMap::new()
            } else {
                serde_json::from_str(&raw)?
            }
        } else {
            BTreeMap::new()
        };
        Ok(Self { path, items })
    }

    /// Location of the backing file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn persist(&self) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        let tmp = self.path.with_extension("tmp");
        fs::write(&tmp, serde_json::to_vec(&self.items)?)?;
        fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}

impl KeyValueStore for FileStore {
    fn get_item(&self, key: &str) -> Result<Option<String>> {
        Ok(self.items.get(key).cloned())
    }

    fn set_item(&mut self, key: &str, value: String) -> Result<()> {
        let previous = self.items.insert(key.to_string(), value);
        if let Err(err) = self.persist() {
            // Keep memory consistent with disk
            match previous {
                Some(old) => self.items.insert(key.to_string(), old),
                None => self.items.remove(key),
            };
            return Err(err);
        }
        Ok(())
    }

    fn remove_item(&mut self, key: &str) -> Result<()> {
        self.remove_items(&[key.to_string()])
    }

    fn remove_items(&mut self, keys: &[String]) -> Result<()> {
        let removed: Vec<(String, String)> = keys
            .iter()
            .filter_map(|key| self.items.remove_entry(key.as_str()))
            .collect();
        if removed.is_empty() {
            return Ok(());
        }

        if let Err(err) = self.persist() {
            // Keep memory consistent with disk
            self.items.extend(removed);
            return Err(err);
        }
        Ok(())
    }

    fn keys(&self) -> Result<Vec<String>> {
        Ok(self.items.keys().cloned().collect())
    }
}
