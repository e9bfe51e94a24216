use std::collections::HashMap;
use std::collections::hash_map;
use std::sync::Mutex;

use ::keyring::Entry;
use ::keyring::Error as KeyringError;
use tracing::trace;

use crate::KeyValueStore;
use crate::Result;
use crate::StoreError;

/// Stores each key as a separate credential in the platform keyring, under a
/// fixed service name. The key becomes the credential's account name.
///
/// Entries are opened once per key and reused for the life of the store.
#[derive(Debug)]
pub struct KeyringStore {
    service: String,
    entries: Mutex<HashMap<String, Entry>>,
}

impl KeyringStore {
    pub fn new(service: impl Into<String>) -> Self {
        Self {
            service: service.into(),
            entries: Mutex::new(HashMap::new()),
        }
    }

    fn with_entry<T>(
        &self,
        key: &str,
        op: impl FnOnce(&Entry) -> std::result::Result<T, KeyringError>,
    ) -> Result<T> {
        let mut entries = self.entries.lock().map_err(|_| StoreError::Poisoned)?;
        let entry = match entries.entry(key.to_string()) {
            hash_map::Entry::Occupied(slot) => slot.into_mut(),
            hash_map::Entry::Vacant(slot) => slot.insert(Entry::new(&self.service, key)?),
        };
        Ok(op(entry)?)
    }
}

impl KeyValueStore for KeyringStore {
    fn load(&self, key: &str) -> Result<Option<String>> {
        trace!("keyring.load start, service={}, key={key}", self.service);
        self.with_entry(key, |entry| match entry.get_password() {
            Ok(value) => Ok(Some(value)),
            Err(KeyringError::NoEntry) => Ok(None),
            Err(err) => Err(err),
        })
    }

    fn save(&self, key: &str, value: &str) -> Result<()> {
        trace!("keyring.save start, service={}, key={key}", self.service);
        self.with_entry(key, |entry| entry.set_password(value))
    }

    fn delete(&self, key: &str) -> Result<bool> {
        trace!("keyring.delete start, service={}, key={key}", self.service);
        self.with_entry(key, |entry| match entry.delete_credential() {
            Ok(()) => Ok(true),
            Err(KeyringError::NoEntry) => Ok(false),
            Err(err) => Err(err),
        })
    }
}
