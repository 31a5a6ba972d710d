//! # Desktop Bridge Implementations
//!
//! Default implementations of bridge traits for desktop platforms
//! (macOS, Windows, Linux).
//!
//! ## Overview
//!
//! This crate provides production-ready implementations of the bridge traits
//! the playback core needs on desktop:
//! - `HttpClient` using `reqwest`
//! - `SettingsStore` using a SQLite-backed key-value store
//!
//! The media sink and adaptive stream factory are intentionally not provided
//! here: those are supplied by the host shell that owns the audio output.
//!
//! ## Usage
//!
//! ```ignore
//! use bridge_desktop::{ReqwestHttpClient, SqliteSettingsStore};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let http_client = ReqwestHttpClient::new()?;
//!     let settings = SqliteSettingsStore::new("settings.db").await?;
//!
//!     // Hand both to CoreConfig::builder()
//!     Ok(())
//! }
//! ```

mod http;
mod settings;

pub use http::ReqwestHttpClient;
pub use settings::SqliteSettingsStore;
