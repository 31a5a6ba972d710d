//! Media Sink Abstraction
//!
//! The media sink is the single output element a playback session renders
//! through (an `<audio>` element on the web, a native audio engine elsewhere).
//! There is exactly one sink per session and at most one live decoder may be
//! bound to it at any time.
//!
//! ## Reconciliation contract
//!
//! The sink is the source of truth for `current time`, `duration` and the
//! `ended` signal; it reports those through [`MediaSink::subscribe`]. Volume,
//! mute and the loaded source are pushed *into* the sink by the core and are
//! never read back, so state can only flow one way in each direction.
//!
//! ## Event wiring
//!
//! Event delivery uses `tokio::sync::broadcast`. Dropping the receiver is the
//! unsubscribe: teardown of whatever owned the subscription releases the
//! wiring with no explicit unlisten call to forget.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use crate::error::Result;

/// Events reported by the media sink.
///
/// These flow sink → core only. The core never echoes them back.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "event")]
pub enum MediaSinkEvent {
    /// The sink learned the duration of the loaded source.
    DurationKnown {
        /// Total duration in seconds.
        seconds: f64,
    },
    /// Playback position advanced (or a seek completed).
    TimeUpdate {
        /// Current position in seconds.
        seconds: f64,
    },
    /// The loaded source played to its end.
    Ended,
    /// The sink failed to load or decode the current source.
    Error {
        /// Human-readable error message.
        message: String,
    },
}

/// Platform media output element.
///
/// Implementations must be cheap to call from the UI thread; none of these
/// operations may block on network I/O (loading happens in the background and
/// is reported through events).
#[async_trait]
pub trait MediaSink: Send + Sync {
    /// Point the sink directly at a URL (native-playback fallback path).
    ///
    /// Used when no adaptive client can run but the sink can decode the
    /// manifest's container natively.
    async fn set_source_url(&self, url: &str) -> Result<()>;

    /// Detach any loaded source and discard buffered data.
    async fn clear_source(&self) -> Result<()>;

    /// Start or resume rendering the loaded source.
    async fn play(&self) -> Result<()>;

    /// Pause rendering, keeping the position.
    async fn pause(&self) -> Result<()>;

    /// Seek to an absolute position in seconds.
    async fn seek(&self, seconds: f64) -> Result<()>;

    /// Set output volume in `[0.0, 1.0]`.
    async fn set_volume(&self, volume: f32) -> Result<()>;

    /// Mute or unmute without touching the volume value.
    async fn set_muted(&self, muted: bool) -> Result<()>;

    /// Whether the sink can natively decode the given container format
    /// (e.g. `"mpegurl"`, `"mp4"`, `"mp3"`).
    fn can_play_container(&self, container: &str) -> bool;

    /// Subscribe to sink events. Dropping the receiver unsubscribes.
    fn subscribe(&self) -> broadcast::Receiver<MediaSinkEvent>;
}
