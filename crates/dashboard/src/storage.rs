//! Ephemeral, tab-scoped key/value storage.
//!
//! Clones of a [`SharedTabStorage`] see the same slots, which is how
//! concurrently open tabs observe each other's writes.

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

pub trait EphemeralStorage: Send + Sync {
    fn get(&self, key: &str) -> Option<String>;
    /// Last write wins.
    fn set(&self, key: &str, value: String);
    fn remove(&self, key: &str);
}

#[derive(Debug, Clone, Default)]
pub struct SharedTabStorage {
    slots: Arc<RwLock<HashMap<String, String>>>,
}

impl SharedTabStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drop everything, as when the storage scope (browser session) ends.
    pub fn clear(&self) {
        self.slots
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }
}

impl EphemeralStorage for SharedTabStorage {
    fn get(&self, key: &str) -> Option<String> {
        self.slots
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .cloned()
    }

    fn set(&self, key: &str, value: String) {
        self.slots
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key.to_string(), value);
    }

    fn remove(&self, key: &str) {
        self.slots
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(key);
    }
}
