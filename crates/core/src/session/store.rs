//! Session store trait and in-memory implementation.

use std::collections::HashMap;
use std::sync::RwLock;

use crate::errors::{Error, Result};

/// Persisted string key-value store holding the user's web session.
///
/// Mirrors the host's local storage: values are opaque strings, and composite
/// records are stored JSON-encoded.
pub trait SessionStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>>;

    fn set(&self, key: &str, value: &str) -> Result<()>;

    /// Write several entries as one batch.
    ///
    /// Backends that rewrite their whole state on every change override this
    /// to persist once.
    fn set_many(&self, entries: &[(String, String)]) -> Result<()> {
        for (key, value) in entries {
            self.set(key, value)?;
        }
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<()>;
}

/// In-memory store for tests and embedding.
#[derive(Debug, Default)]
pub struct MemorySessionStore {
    entries: RwLock<HashMap<String, String>>,
}

impl MemorySessionStore {
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
            entries: RwLock::new(
                entries
                    .into_iter()
                    .map(|(k, v)| (k.into(), v.into()))
                    .collect(),
            ),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.read().map(|e| e.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl SessionStore for MemorySessionStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        let entries = self
            .entries
            .read()
            .map_err(|_| Error::SessionStore("Session store lock poisoned".into()))?;
        Ok(entries.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        let mut entries = self
            .entries
            .write()
            .map_err(|_| Error::SessionStore("Session store lock poisoned".into()))?;
        entries.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn set_many(&self, batch: &[(String, String)]) -> Result<()> {
        let mut entries = self
            .entries
            .write()
            .map_err(|_| Error::SessionStore("Session store lock poisoned".into()))?;
        entries.extend(batch.iter().cloned());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<()> {
        let mut entries = self
            .entries
            .write()
            .map_err(|_| Error::SessionStore("Session store lock poisoned".into()))?;
        entries.remove(key);
        Ok(())
    }
}
