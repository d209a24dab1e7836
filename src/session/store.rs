//! Key-value persistence for the current session. Each field of the session
//! record that the rest of the app reads independently (expiry, last
//! activity, id) gets its own slot so it can be set or removed on its own.

use std::collections::HashMap;
use std::sync::Mutex;
use thiserror::Error;

pub const KEY_RECORD: &str = "aula.session";
pub const KEY_EXPIRY: &str = "aula.session.expiry";
pub const KEY_LAST_ACTIVITY: &str = "aula.session.last-activity";
pub const KEY_SESSION_ID: &str = "aula.session.id";

/// All session storage slots, in removal order for `clear`.
pub const SESSION_KEYS: &[&str] = &[KEY_RECORD, KEY_EXPIRY, KEY_LAST_ACTIVITY, KEY_SESSION_ID];

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("session store backend error: {0}")]
    Backend(String),
}

pub trait SessionStore: Send + Sync + std::fmt::Debug {
    /// # Errors
    /// Returns an error if the backend cannot be read.
    fn get(&self, key: &str) -> Result<Option<String>, StoreError>;

    /// # Errors
    /// Returns an error if the backend cannot be written.
    fn set(&self, key: &str, value: &str) -> Result<(), StoreError>;

    /// Removing an absent key is not an error.
    ///
    /// # Errors
    /// Returns an error if the backend cannot be written.
    fn remove(&self, key: &str) -> Result<(), StoreError>;
}

#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl SessionStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        let entries = self
            .entries
            .lock()
            .map_err(|err| StoreError::Backend(err.to_string()))?;
        Ok(entries.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        let mut entries = self
            .entries
            .lock()
            .map_err(|err| StoreError::Backend(err.to_string()))?;
        entries.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StoreError> {
        let mut entries = self
            .entries
            .lock()
            .map_err(|err| StoreError::Backend(err.to_string()))?;
        entries.remove(key);
        Ok(())
    }
}
