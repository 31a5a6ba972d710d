//! In-Memory Bridge Implementations
//!
//! Simple process-local implementations used by tests and demos. Not suitable
//! as durable storage.

use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::HashMap;

use crate::error::Result;
use crate::storage::SettingsStore;

/// In-memory key-value settings store.
///
/// Values are kept as strings; typed accessors parse on read, matching the
/// tolerance rules of durable stores (a non-parsable value reads as `None`).
#[derive(Debug, Default)]
pub struct MemorySettingsStore {
    entries: RwLock<HashMap<String, String>>,
}

impl MemorySettingsStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a raw entry, bypassing the typed setters. Lets tests plant
    /// corrupt values to exercise hydration fallbacks.
    pub fn seed_raw(&self, key: &str, value: &str) {
        self.entries
            .write()
            .insert(key.to_string(), value.to_string());
    }
}

#[async_trait]
impl SettingsStore for MemorySettingsStore {
    async fn set_string(&self, key: &str, value: &str) -> Result<()> {
        self.entries
            .write()
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn get_string(&self, key: &str) -> Result<Option<String>> {
        Ok(self.entries.read().get(key).cloned())
    }

    async fn set_bool(&self, key: &str, value: bool) -> Result<()> {
        self.set_string(key, if value { "true" } else { "false" })
            .await
    }

    async fn get_bool(&self, key: &str) -> Result<Option<bool>> {
        Ok(self
            .entries
            .read()
            .get(key)
            .and_then(|v| v.parse::<bool>().ok()))
    }

    async fn set_f64(&self, key: &str, value: f64) -> Result<()> {
        self.set_string(key, &value.to_string()).await
    }

    async fn get_f64(&self, key: &str) -> Result<Option<f64>> {
        Ok(self
            .entries
            .read()
            .get(key)
            .and_then(|v| v.parse::<f64>().ok()))
    }

    async fn remove(&self, key: &str) -> Result<()> {
        self.entries.write().remove(key);
        Ok(())
    }

    async fn keys(&self) -> Result<Vec<String>> {
        Ok(self.entries.read().keys().cloned().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn typed_roundtrip() {
        let store = MemorySettingsStore::new();
        store.set_f64("volume", 0.8).await.unwrap();
        store.set_bool("shuffle", true).await.unwrap();

        assert_eq!(store.get_f64("volume").await.unwrap(), Some(0.8));
        assert_eq!(store.get_bool("shuffle").await.unwrap(), Some(true));
        assert_eq!(store.get_string("missing").await.unwrap(), None);
    }

    #[tokio::test]
    async fn corrupt_value_reads_as_none() {
        let store = MemorySettingsStore::new();
        store.seed_raw("volume", "not-a-number");
        assert_eq!(store.get_f64("volume").await.unwrap(), None);
    }

    #[tokio::test]
    async fn remove_is_idempotent() {
        let store = MemorySettingsStore::new();
        store.set_string("k", "v").await.unwrap();
        store.remove("k").await.unwrap();
        store.remove("k").await.unwrap();
        assert_eq!(store.get_string("k").await.unwrap(), None);
    }
}
