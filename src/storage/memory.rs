use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use super::{KeyValueStore, StorageError};

/// In-memory [`KeyValueStore`].
///
/// Writes can be switched off with [`MemoryStore::set_read_only`] to simulate
/// a full or restricted storage backend.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, String>>,
    read_only: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store pre-populated with `entries`.
    pub fn with_entries<K, V>(entries: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        let map = entries
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .collect();
        Self {
            entries: Mutex::new(map),
            read_only: AtomicBool::new(false),
        }
    }

    /// Reject every subsequent write with [`StorageError::Unavailable`].
    pub fn set_read_only(&self, read_only: bool) {
        self.read_only.store(read_only, Ordering::SeqCst);
    }

    fn check_writable(&self) -> Result<(), StorageError> {
        if self.read_only.load(Ordering::SeqCst) {
            return Err(StorageError::Unavailable("store is read-only".to_string()));
        }
        Ok(())
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        let entries = self.entries.lock().expect("memory store lock poisoned");
        Ok(entries.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        self.check_writable()?;
        let mut entries = self.entries.lock().expect("memory store lock poisoned");
        entries.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn set_if_absent(&self, key: &str, value: &str) -> Result<String, StorageError> {
        let mut entries = self.entries.lock().expect("memory store lock poisoned");
        if let Some(existing) = entries.get(key) {
            return Ok(existing.clone());
        }
        self.check_writable()?;
        entries.insert(key.to_string(), value.to_string());
        Ok(value.to_string())
    }
}
