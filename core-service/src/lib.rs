//! # Client Core Service
//!
//! The outward surface of the streaming client core. Hosts construct a
//! [`ClientCore`] from a [`CoreConfig`](core_runtime::config::CoreConfig)
//! carrying their platform bridges, then drive it through the facade:
//!
//! ```ignore
//! let core = ClientCore::initialize(config).await?;
//! core.sign_in().await?;
//! match core.play_track("song-1").await? {
//!     PlayOutcome::Playing { .. } => {}
//!     PlayOutcome::PurchaseStarted { stage, .. } => render_purchase(stage),
//! }
//! ```

pub mod error;
pub mod service;

pub use error::{Result, ServiceError};
pub use service::{ClientCore, PlayOutcome};

// Convenience re-exports for hosts using the stock desktop bridges.
#[cfg(feature = "desktop-shims")]
pub use bridge_desktop::{ReqwestHttpClient, SqliteSettingsStore};
