//! SQLite-backed Settings Storage

use async_trait::async_trait;
use bridge_traits::{
    error::{BridgeError, Result},
    storage::SettingsStore,
};
use sqlx::{sqlite::SqlitePoolOptions, Row, SqlitePool};
use std::path::Path;
use tracing::{debug, warn};

/// SQLite-backed settings store for desktop platforms
///
/// Stores typed key-value pairs in a single `settings` table. Each value
/// carries a type tag so a value written as one type is never silently
/// reinterpreted as another; a type mismatch reads back as `None`.
pub struct SqliteSettingsStore {
    pool: SqlitePool,
}

impl SqliteSettingsStore {
    /// Open (or create) a settings database at the given path
    pub async fn new(db_path: impl AsRef<Path>) -> Result<Self> {
        let url = format!("sqlite://{}?mode=rwc", db_path.as_ref().display());
        Self::connect(&url).await
    }

    /// Create an in-memory store, useful for tests
    pub async fn in_memory() -> Result<Self> {
        Self::connect("sqlite::memory:").await
    }

    async fn connect(url: &str) -> Result<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect(url)
            .await
            .map_err(|e| BridgeError::StorageError(format!("Failed to open settings db: {}", e)))?;

        sqlx::query(
            "CREATE TABLE IF NOT EXISTS settings (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL,
                value_type TEXT NOT NULL,
                updated_at INTEGER NOT NULL
            )",
        )
        .execute(&pool)
        .await
        .map_err(|e| BridgeError::StorageError(format!("Failed to create settings table: {}", e)))?;

        Ok(Self { pool })
    }

    async fn set_value(&self, key: &str, value: &str, value_type: &str) -> Result<()> {
        let now = unix_timestamp();
        sqlx::query(
            "INSERT INTO settings (key, value, value_type, updated_at)
             VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(key) DO UPDATE SET
                value = excluded.value,
                value_type = excluded.value_type,
                updated_at = excluded.updated_at",
        )
        .bind(key)
        .bind(value)
        .bind(value_type)
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(|e| BridgeError::StorageError(format!("Failed to write setting: {}", e)))?;

        debug!(key, value_type, "Setting stored");
        Ok(())
    }

    async fn get_value(&self, key: &str, expected_type: &str) -> Result<Option<String>> {
        let row = sqlx::query("SELECT value, value_type FROM settings WHERE key = ?1")
            .bind(key)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| BridgeError::StorageError(format!("Failed to read setting: {}", e)))?;

        match row {
            None => Ok(None),
            Some(row) => {
                let value: String = row.get("value");
                let value_type: String = row.get("value_type");
                if value_type != expected_type {
                    warn!(
                        key,
                        stored = %value_type,
                        expected = %expected_type,
                        "Setting type mismatch, treating as absent"
                    );
                    return Ok(None);
                }
                Ok(Some(value))
            }
        }
    }
}

/// Seconds since the Unix epoch.
fn unix_timestamp() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}

#[async_trait]
impl SettingsStore for SqliteSettingsStore {
    async fn set_string(&self, key: &str, value: &str) -> Result<()> {
        self.set_value(key, value, "string").await
    }

    async fn get_string(&self, key: &str) -> Result<Option<String>> {
        self.get_value(key, "string").await
    }

    async fn set_bool(&self, key: &str, value: bool) -> Result<()> {
        self.set_value(key, if value { "true" } else { "false" }, "bool")
            .await
    }

    async fn get_bool(&self, key: &str) -> Result<Option<bool>> {
        match self.get_value(key, "bool").await? {
            None => Ok(None),
            Some(raw) => match raw.as_str() {
                "true" => Ok(Some(true)),
                "false" => Ok(Some(false)),
                other => {
                    warn!(key, value = other, "Corrupt boolean setting, treating as absent");
                    Ok(None)
                }
            },
        }
    }

    async fn set_f64(&self, key: &str, value: f64) -> Result<()> {
        self.set_value(key, &value.to_string(), "f64").await
    }

    async fn get_f64(&self, key: &str) -> Result<Option<f64>> {
        match self.get_value(key, "f64").await? {
            None => Ok(None),
            Some(raw) => match raw.parse::<f64>() {
                Ok(v) => Ok(Some(v)),
                Err(_) => {
                    warn!(key, value = %raw, "Corrupt numeric setting, treating as absent");
                    Ok(None)
                }
            },
        }
    }

    async fn remove(&self, key: &str) -> Result<()> {
        sqlx::query("DELETE FROM settings WHERE key = ?1")
            .bind(key)
            .execute(&self.pool)
            .await
            .map_err(|e| BridgeError::StorageError(format!("Failed to remove setting: {}", e)))?;
        Ok(())
    }

    async fn keys(&self) -> Result<Vec<String>> {
        let rows = sqlx::query("SELECT key FROM settings ORDER BY key")
            .fetch_all(&self.pool)
            .await
            .map_err(|e| BridgeError::StorageError(format!("Failed to list settings: {}", e)))?;

        Ok(rows.iter().map(|row| row.get("key")).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn string_round_trip() {
        let store = SqliteSettingsStore::in_memory().await.unwrap();
        store.set_string("session.context", "{}").await.unwrap();
        assert_eq!(
            store.get_string("session.context").await.unwrap(),
            Some("{}".to_string())
        );
    }

    #[tokio::test]
    async fn missing_key_reads_none() {
        let store = SqliteSettingsStore::in_memory().await.unwrap();
        assert_eq!(store.get_f64("session.volume").await.unwrap(), None);
    }

    #[tokio::test]
    async fn overwrite_replaces_value() {
        let store = SqliteSettingsStore::in_memory().await.unwrap();
        store.set_f64("session.volume", 0.5).await.unwrap();
        store.set_f64("session.volume", 0.8).await.unwrap();
        assert_eq!(store.get_f64("session.volume").await.unwrap(), Some(0.8));
    }

    #[tokio::test]
    async fn type_mismatch_reads_none() {
        let store = SqliteSettingsStore::in_memory().await.unwrap();
        store.set_string("session.shuffle_mode", "yes").await.unwrap();
        assert_eq!(store.get_bool("session.shuffle_mode").await.unwrap(), None);
    }

    #[tokio::test]
    async fn bool_round_trip() {
        let store = SqliteSettingsStore::in_memory().await.unwrap();
        store.set_bool("session.shuffle_mode", true).await.unwrap();
        assert_eq!(
            store.get_bool("session.shuffle_mode").await.unwrap(),
            Some(true)
        );
    }

    #[tokio::test]
    async fn remove_then_read_none() {
        let store = SqliteSettingsStore::in_memory().await.unwrap();
        store.set_string("session.default_track_id", "t1").await.unwrap();
        store.remove("session.default_track_id").await.unwrap();
        assert_eq!(
            store.get_string("session.default_track_id").await.unwrap(),
            None
        );
    }

    #[tokio::test]
    async fn keys_lists_everything() {
        let store = SqliteSettingsStore::in_memory().await.unwrap();
        store.set_f64("a", 1.0).await.unwrap();
        store.set_string("b", "x").await.unwrap();
        assert_eq!(store.keys().await.unwrap(), vec!["a", "b"]);
    }
}
