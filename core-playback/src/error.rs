//! Playback error types.

use thiserror::Error;

/// Errors that can occur during playback operations.
///
/// Playback failures are their own failure domain; they never cascade into
/// the purchase flow and vice versa.
#[derive(Error, Debug)]
pub enum PlaybackError {
    /// The manifest for a track could not be loaded or parsed.
    ///
    /// Scoped to the named track: the track is marked locked and reselecting
    /// it retries. Distinct from a transient loading state.
    #[error("Stream unavailable for track {track_id}: {message}")]
    StreamUnavailable { track_id: String, message: String },

    /// Track was not found by the configured track source.
    #[error("Track not found: {0}")]
    TrackNotFound(String),

    /// The media sink rejected an operation.
    #[error("Media sink error: {0}")]
    Sink(String),

    /// Bridge-level failure (transport, storage).
    #[error("Bridge error: {0}")]
    Bridge(#[from] bridge_traits::BridgeError),

    /// Catalog lookup failed while resolving a queue neighbor.
    #[error("Catalog error: {0}")]
    Catalog(#[from] core_catalog::CatalogError),

    /// Internal error (should not occur in normal operation).
    #[error("Internal error: {0}")]
    Internal(String),
}

impl PlaybackError {
    /// Returns `true` if this error is transient and the operation can be
    /// retried by the user.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            PlaybackError::StreamUnavailable { .. } | PlaybackError::Bridge(_)
        )
    }
}

/// Result type for playback operations.
pub type Result<T> = std::result::Result<T, PlaybackError>;
