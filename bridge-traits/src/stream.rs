//! Adaptive Streaming Client Abstraction
//!
//! Wraps an external adaptive-bitrate streaming engine (segmented multi-rate
//! audio over HTTPS). The engine is created per track, bound to the session's
//! [`MediaSink`](crate::media::MediaSink), and destroyed before a successor
//! may exist; two live decoders on one sink is forbidden.
//!
//! The underlying engines generally offer no true abort; cancellation is
//! achieved by calling [`AdaptiveStreamClient::destroy`] and having the core
//! ignore late completions via its refresh-token comparison.

use async_trait::async_trait;
use std::sync::Arc;

use crate::error::Result;
use crate::media::MediaSink;

/// Result of loading an adaptive-streaming manifest.
#[derive(Debug, Clone, PartialEq)]
pub struct StreamManifestInfo {
    /// Total duration in seconds, when the manifest declares one.
    pub duration_seconds: Option<f64>,
    /// Container format of the segments (e.g. `"mpegurl"`).
    pub container: String,
    /// Available bitrates in bits per second, highest first.
    pub bitrates: Vec<u32>,
}

/// One live adaptive-streaming engine bound to a sink.
#[async_trait]
pub trait AdaptiveStreamClient: Send + Sync {
    /// Fetch and parse the manifest, then bind the decoder to the sink.
    ///
    /// Resolves once the stream is ready to play. This is a suspension point;
    /// callers must treat the attachment as stale if the session moved on
    /// while it was awaited.
    ///
    /// # Errors
    ///
    /// Returns error if the manifest cannot be fetched or parsed, or if no
    /// variant is playable.
    async fn load(&self, manifest_url: &str) -> Result<StreamManifestInfo>;

    /// Tear down the decoder and release the sink.
    ///
    /// Must be idempotent. After `destroy` the client is dead; late `load`
    /// completions from before the call must have no observable effect.
    async fn destroy(&self) -> Result<()>;
}

/// Factory creating adaptive-streaming clients for the current runtime.
pub trait AdaptiveStreamFactory: Send + Sync {
    /// Whether the adaptive engine can run in this runtime at all.
    ///
    /// When `false`, the core falls back to native playback through the sink
    /// if the container is natively decodable.
    fn is_supported(&self) -> bool;

    /// Create a fresh client bound to the given sink.
    fn create(&self, sink: Arc<dyn MediaSink>) -> Arc<dyn AdaptiveStreamClient>;
}
