//! # Host Bridge Traits
//!
//! Platform abstraction traits that must be implemented by each host platform.
//!
//! ## Overview
//!
//! This crate defines the contract between the client core and platform-specific
//! implementations. Each trait represents a capability that the core requires but
//! that must be implemented differently per platform (desktop, mobile, web).
//!
//! ## Traits
//!
//! ### Networking & Persistence
//! - [`HttpClient`](http::HttpClient) - Async HTTP operations with retry and TLS
//! - [`SettingsStore`](storage::SettingsStore) - Key-value persistence for
//!   session state that survives restarts
//!
//! ### Playback
//! - [`MediaSink`](media::MediaSink) - The single media output element the
//!   session plays through; source of truth for time/duration/ended
//! - [`AdaptiveStreamFactory`](stream::AdaptiveStreamFactory) - Creates
//!   adaptive-bitrate streaming clients bound to the media sink
//!
//! ### Commerce
//! - [`PaymentGatewaySurface`](gateway::PaymentGatewaySurface) - External
//!   checkout UI of one payment provider
//!
//! ## Fail-Fast Strategy
//!
//! The core should fail fast with descriptive errors when a required capability
//! is missing:
//!
//! ```ignore
//! let sink = config.media_sink
//!     .ok_or_else(|| Error::CapabilityMissing {
//!         capability: "MediaSink".to_string(),
//!         message: "No media sink implementation provided. \
//!                  Desktop: wire the host audio element adapter.".to_string()
//!     })?;
//! ```
//!
//! ## Error Handling
//!
//! All bridge traits use the [`BridgeError`](error::BridgeError) type.
//! Platform implementations should convert platform-specific errors to
//! `BridgeError` and provide actionable messages.
//!
//! ## Thread Safety
//!
//! All bridge traits require `Send + Sync` bounds to support safe concurrent
//! usage across async tasks.

pub mod error;
pub mod gateway;
pub mod http;
pub mod media;
pub mod memory;
pub mod storage;
pub mod stream;

pub use error::BridgeError;

// Re-export commonly used types
pub use gateway::{GatewayIntent, GatewayOutcome, PaymentGatewaySurface};
pub use http::{HttpClient, HttpMethod, HttpRequest, HttpResponse};
pub use media::{MediaSink, MediaSinkEvent};
pub use memory::MemorySettingsStore;
pub use storage::SettingsStore;
pub use stream::{AdaptiveStreamClient, AdaptiveStreamFactory, StreamManifestInfo};
