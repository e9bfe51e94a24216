//! Local key-value persistence for session credentials.
//!
//! A [`KeyValueStore`] holds string values under string keys. Absence of a key
//! is a normal state and is reported as `Ok(None)`, never as an error.

mod file;
mod os_keyring;

use std::collections::HashMap;
use std::fmt::Debug;
use std::sync::Mutex;
use thiserror::Error;

pub use file::FileStore;
pub use os_keyring::KeyringStore;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Keyring error: {0}")]
    Keyring(#[from] ::keyring::Error),

    #[error("store lock poisoned")]
    Poisoned,
}

pub type Result<T> = std::result::Result<T, StoreError>;

pub trait KeyValueStore: Debug + Send + Sync {
    fn load(&self, key: &str) -> Result<Option<String>>;

    fn save(&self, key: &str, value: &str) -> Result<()>;

    /// Removes `key`. Returns whether a value was present.
    fn delete(&self, key: &str) -> Result<bool>;
}

/// Process-local store. Nothing survives the process; used for tests and for
/// hosts that do not want credentials on disk.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_entries<I, K, V>(entries: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            entries: Mutex::new(
                entries
                    .into_iter()
                    .map(|(k, v)| (k.into(), v.into()))
                    .collect(),
            ),
        }
    }
}

impl KeyValueStore for MemoryStore {
    fn load(&self, key: &str) -> Result<Option<String>> {
        let entries = self.entries.lock().map_err(|_| StoreError::Poisoned)?;
        Ok(entries.get(key).cloned())
    }

    fn save(&self, key: &str, value: &str) -> Result<()> {
        let mut entries = self.entries.lock().map_err(|_| StoreError::Poisoned)?;
        entries.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn delete(&self, key: &str) -> Result<bool> {
        let mut entries = self.entries.lock().map_err(|_| StoreError::Poisoned)?;
        Ok(entries.remove(key).is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn memory_store_reports_missing_keys_as_none() {
        let store = MemoryStore::new();
        assert_eq!(None, store.load("token").unwrap());
        assert!(!store.delete("token").unwrap());
    }

    #[test]
    fn memory_store_overwrites_and_deletes() {
        let store = MemoryStore::with_entries([("token", "old")]);
        store.save("token", "new").unwrap();
        assert_eq!(Some("new".to_string()), store.load("token").unwrap());
        assert!(store.delete("token").unwrap());
        assert_eq!(None, store.load("token").unwrap());
    }
}
