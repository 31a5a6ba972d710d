//! Durable Key-Value Storage Abstraction
//!
//! Abstracts platform-specific preferences/settings storage used to persist
//! the parts of the playback session that survive a restart (volume, default
//! track, playback context, shuffle and repeat modes).

use async_trait::async_trait;

use crate::error::Result;

/// Key-value settings storage trait
///
/// Abstracts platform-specific preferences storage:
/// - Desktop: SQLite or config files
/// - Mobile: UserDefaults / SharedPreferences
/// - Web: localStorage / IndexedDB
///
/// Values persisted through this trait are read once at startup. Readers must
/// tolerate missing or corrupt entries by falling back to defaults; a corrupt
/// entry is never an error surfaced to the user.
///
/// # Example
///
/// ```ignore
/// use bridge_traits::storage::SettingsStore;
///
/// async fn save_preference(store: &dyn SettingsStore) -> Result<()> {
///     store.set_f64("playback.volume", 0.8).await?;
///     store.set_bool("playback.shuffle", true).await?;
///     Ok(())
/// }
/// ```
#[async_trait]
pub trait SettingsStore: Send + Sync {
    /// Store a string value
    async fn set_string(&self, key: &str, value: &str) -> Result<()>;

    /// Retrieve a string value
    ///
    /// Returns `Ok(None)` if the key doesn't exist.
    async fn get_string(&self, key: &str) -> Result<Option<String>>;

    /// Store a boolean value
    async fn set_bool(&self, key: &str, value: bool) -> Result<()>;

    /// Retrieve a boolean value
    async fn get_bool(&self, key: &str) -> Result<Option<bool>>;

    /// Store a floating-point value
    async fn set_f64(&self, key: &str, value: f64) -> Result<()>;

    /// Retrieve a floating-point value
    async fn get_f64(&self, key: &str) -> Result<Option<f64>>;

    /// Remove a key
    ///
    /// Removing a missing key is not an error.
    async fn remove(&self, key: &str) -> Result<()>;

    /// List all stored keys
    async fn keys(&self) -> Result<Vec<String>>;
}
