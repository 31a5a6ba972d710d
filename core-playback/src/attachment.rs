//! # Streaming Attachment Manager
//!
//! Owns the lifecycle of the adaptive-streaming client bound to the session's
//! media sink. The cardinal invariant is destroy-before-create: at most one
//! client may be live at any time, and a predecessor is always torn down
//! before a successor is built.
//!
//! `load()` is a suspension point. Selections racing through it are resolved
//! with the session's refresh token: after the await, the attachment compares
//! the token it was started with against the session's current one and
//! discards itself when stale. Last writer wins; earlier attachments never
//! clobber a newer one.
//!
//! Play requests arriving while the attachment is still loading are deferred,
//! tagged with the requesting token, and honored exactly once when that same
//! attachment becomes ready. Teardown drops any pending deferred request.

use std::collections::HashSet;
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, instrument, warn};

use bridge_traits::media::MediaSink;
use bridge_traits::stream::{AdaptiveStreamClient, AdaptiveStreamFactory};
use core_catalog::types::Track;
use core_runtime::events::{CoreEvent, EventBus, PlaybackEvent};

use crate::error::{PlaybackError, Result};
use crate::session::SessionStore;

// ============================================================================
// Status & Stats
// ============================================================================

/// Lifecycle state of the attachment for one track.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttachmentStatus {
    /// No attachment exists.
    Idle,
    /// A manifest load is in flight.
    Loading,
    /// The stream is bound to the sink and playable.
    Ready,
    /// The manifest could not be loaded; reselecting the track retries.
    Unavailable,
}

/// Lifetime counters used to assert the client-per-track discipline.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AttachmentStats {
    pub clients_created: u64,
    pub clients_destroyed: u64,
}

// ============================================================================
// Internal state
// ============================================================================

struct ActiveAttachment {
    client: Arc<dyn AdaptiveStreamClient>,
    track_id: String,
    token: u64,
    ready: bool,
}

// ============================================================================
// Manager
// ============================================================================

/// Lifecycle owner for the per-track streaming client.
///
/// All attachment mutation is serialized through one async mutex, so
/// destroy-before-create holds even when selections race. The loading await
/// itself happens outside the lock with the token check re-acquired after.
pub struct StreamingAttachmentManager {
    sink: Arc<dyn MediaSink>,
    factory: Arc<dyn AdaptiveStreamFactory>,
    session: Arc<SessionStore>,
    events: EventBus,
    active: tokio::sync::Mutex<Option<ActiveAttachment>>,
    /// Token of a play request waiting for its attachment to become ready.
    deferred_play: Mutex<Option<u64>>,
    /// Tracks whose last load attempt failed. Cleared per track on reattach.
    unavailable: Mutex<HashSet<String>>,
    stats: Mutex<AttachmentStats>,
}

impl StreamingAttachmentManager {
    pub fn new(
        sink: Arc<dyn MediaSink>,
        factory: Arc<dyn AdaptiveStreamFactory>,
        session: Arc<SessionStore>,
        events: EventBus,
    ) -> Self {
        Self {
            sink,
            factory,
            session,
            events,
            active: tokio::sync::Mutex::new(None),
            deferred_play: Mutex::new(None),
            unavailable: Mutex::new(HashSet::new()),
            stats: Mutex::new(AttachmentStats::default()),
        }
    }

    /// Attach the stream for `track`, tearing down any predecessor first.
    ///
    /// `token` is the refresh token minted by the selection this attachment
    /// serves. A stale result (the session moved on during the load) is
    /// destroyed silently and reported as `Ok`.
    ///
    /// # Errors
    ///
    /// Returns [`PlaybackError::StreamUnavailable`] when the manifest cannot
    /// be loaded and no native fallback applies. The failure is scoped to
    /// the track; the session stays alive.
    #[instrument(skip(self, track), fields(track_id = %track.id, token))]
    pub async fn attach(&self, track: &Track, token: u64) -> Result<()> {
        self.unavailable.lock().remove(&track.id);

        if !self.factory.is_supported() {
            return self.attach_native_fallback(track, token).await;
        }

        // Claim the slot: the outgoing client is destroyed and its successor
        // created under one guard, so interleaving attaches serialize on the
        // whole exchange and destroy-before-create holds.
        let client = {
            *self.deferred_play.lock() = None;
            let mut active = self.active.lock().await;
            if let Some(att) = active.take() {
                if let Err(error) = att.client.destroy().await {
                    warn!(%error, track_id = %att.track_id, "stream client destroy failed");
                }
                self.stats.lock().clients_destroyed += 1;
            }
            let client = self.factory.create(self.sink.clone());
            self.stats.lock().clients_created += 1;
            *active = Some(ActiveAttachment {
                client: client.clone(),
                track_id: track.id.clone(),
                token,
                ready: false,
            });
            client
        };

        // Suspension point: the session may move on while this runs.
        let loaded = client.load(&track.streaming_manifest_url).await;

        if self.session.current_refresh_token() != token {
            debug!("attachment became stale during load, discarding");
            self.destroy_if_token(token).await;
            return Ok(());
        }

        match loaded {
            Ok(info) => {
                {
                    let mut active = self.active.lock().await;
                    if let Some(att) = active.as_mut() {
                        if att.token == token {
                            att.ready = true;
                        }
                    }
                }

                if let Some(seconds) = info.duration_seconds {
                    self.session.set_duration(seconds);
                    self.emit(PlaybackEvent::DurationKnown {
                        track_id: track.id.clone(),
                        seconds,
                    });
                }
                self.emit(PlaybackEvent::AttachmentReady {
                    track_id: track.id.clone(),
                });

                self.honor_deferred_play(token).await;
                Ok(())
            }
            Err(error) => {
                warn!(%error, "manifest load failed");
                self.destroy_if_token(token).await;
                self.mark_unavailable(&track.id, error.to_string());
                Err(PlaybackError::StreamUnavailable {
                    track_id: track.id.clone(),
                    message: error.to_string(),
                })
            }
        }
    }

    /// Native fallback: point the sink directly at the manifest URL when the
    /// adaptive engine cannot run but the sink decodes the container itself.
    async fn attach_native_fallback(&self, track: &Track, token: u64) -> Result<()> {
        let container = container_hint(&track.streaming_manifest_url);
        if !self.sink.can_play_container(container) {
            // The selection already moved on; the predecessor must not keep
            // rendering against it.
            self.teardown_current().await;
            let message = format!("no adaptive engine and sink cannot decode {container}");
            self.mark_unavailable(&track.id, message.clone());
            return Err(PlaybackError::StreamUnavailable {
                track_id: track.id.clone(),
                message,
            });
        }

        // No adaptive engine on this path; a stand-in keeps the teardown
        // contract uniform.
        self.stats.lock().clients_created += 1;
        self.replace_active(Some(ActiveAttachment {
            client: Arc::new(NativeAttachment {
                sink: self.sink.clone(),
            }),
            track_id: track.id.clone(),
            token,
            ready: false,
        }))
        .await;

        if let Err(error) = self.sink.set_source_url(&track.streaming_manifest_url).await {
            self.destroy_if_token(token).await;
            return Err(error.into());
        }

        if self.session.current_refresh_token() != token {
            self.destroy_if_token(token).await;
            return Ok(());
        }

        {
            let mut active = self.active.lock().await;
            if let Some(att) = active.as_mut() {
                if att.token == token {
                    att.ready = true;
                }
            }
        }
        self.emit(PlaybackEvent::AttachmentReady {
            track_id: track.id.clone(),
        });
        self.honor_deferred_play(token).await;
        Ok(())
    }

    /// Request playback for the attachment identified by `token`.
    ///
    /// Plays immediately when that attachment is ready; otherwise the request
    /// is deferred until readiness. Returns `true` when playback started now.
    pub async fn request_play(&self, token: u64) -> Result<bool> {
        if self.session.current_refresh_token() != token {
            // A newer selection exists; a stale request must not defer.
            return Ok(false);
        }
        let ready_now = {
            let active = self.active.lock().await;
            matches!(active.as_ref(), Some(att) if att.token == token && att.ready)
        };

        if ready_now {
            self.sink.play().await?;
            Ok(true)
        } else {
            *self.deferred_play.lock() = Some(token);
            Ok(false)
        }
    }

    /// Tear down the current attachment, if any. Idempotent.
    pub async fn destroy_current(&self) {
        self.teardown_current().await;
    }

    /// Attachment status for the given track.
    pub async fn status(&self, track_id: &str) -> AttachmentStatus {
        if self.unavailable.lock().contains(track_id) {
            return AttachmentStatus::Unavailable;
        }
        let active = self.active.lock().await;
        match active.as_ref() {
            Some(att) if att.track_id == track_id => {
                if att.ready {
                    AttachmentStatus::Ready
                } else {
                    AttachmentStatus::Loading
                }
            }
            _ => AttachmentStatus::Idle,
        }
    }

    pub fn stats(&self) -> AttachmentStats {
        *self.stats.lock()
    }

    // ------------------------------------------------------------------
    // Internal
    // ------------------------------------------------------------------

    async fn teardown_current(&self) {
        self.replace_active(None).await;
    }

    /// Swap the active slot under one guard held across both the destroy of
    /// the outgoing client and the install of its successor. A task resuming
    /// here can never overwrite an entry it did not itself tear down.
    async fn replace_active(&self, next: Option<ActiveAttachment>) {
        // Any play deferred for the outgoing attachment dies with it.
        *self.deferred_play.lock() = None;

        let mut active = self.active.lock().await;
        if let Some(att) = active.take() {
            if let Err(error) = att.client.destroy().await {
                warn!(%error, track_id = %att.track_id, "stream client destroy failed");
            }
            self.stats.lock().clients_destroyed += 1;
        }
        *active = next;
    }

    /// Destroy the active attachment only if it still carries `token`.
    async fn destroy_if_token(&self, token: u64) {
        let outgoing = {
            let mut active = self.active.lock().await;
            match active.as_ref() {
                Some(att) if att.token == token => active.take(),
                _ => None,
            }
        };
        if let Some(att) = outgoing {
            att.client.destroy().await.ok();
            self.stats.lock().clients_destroyed += 1;
        }
    }

    async fn honor_deferred_play(&self, token: u64) {
        let deferred = {
            let mut pending = self.deferred_play.lock();
            if *pending == Some(token) {
                pending.take()
            } else {
                None
            }
        };
        if deferred.is_some() {
            if let Err(error) = self.sink.play().await {
                warn!(%error, "deferred play failed");
            }
        }
    }

    fn mark_unavailable(&self, track_id: &str, message: String) {
        self.unavailable.lock().insert(track_id.to_string());
        self.emit(PlaybackEvent::StreamUnavailable {
            track_id: track_id.to_string(),
            message,
        });
    }

    fn emit(&self, event: PlaybackEvent) {
        self.events.emit(CoreEvent::Playback(event)).ok();
    }
}

impl std::fmt::Debug for StreamingAttachmentManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamingAttachmentManager")
            .field("stats", &self.stats())
            .finish()
    }
}

/// Stand-in client for the native-fallback path. Destroy detaches the sink
/// source, matching the adaptive client's contract.
struct NativeAttachment {
    sink: Arc<dyn MediaSink>,
}

#[async_trait::async_trait]
impl AdaptiveStreamClient for NativeAttachment {
    async fn load(&self, _manifest_url: &str) -> bridge_traits::error::Result<
        bridge_traits::stream::StreamManifestInfo,
    > {
        Err(bridge_traits::error::BridgeError::NotAvailable(
            "native attachment does not load manifests".to_string(),
        ))
    }

    async fn destroy(&self) -> bridge_traits::error::Result<()> {
        self.sink.clear_source().await
    }
}

/// Guess the container format from the manifest URL's extension.
fn container_hint(url: &str) -> &'static str {
    let path = url.split(['?', '#']).next().unwrap_or(url);
    match path.rsplit('.').next() {
        Some("m3u8") => "mpegurl",
        Some("mpd") => "dash+xml",
        Some("mp3") => "mp3",
        Some("mp4") | Some("m4a") => "mp4",
        _ => "octet-stream",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn container_hint_recognizes_common_extensions() {
        assert_eq!(container_hint("https://cdn/x/master.m3u8"), "mpegurl");
        assert_eq!(container_hint("https://cdn/x/master.m3u8?sig=abc"), "mpegurl");
        assert_eq!(container_hint("https://cdn/x/a.mp3"), "mp3");
        assert_eq!(container_hint("https://cdn/x/a.m4a"), "mp4");
        assert_eq!(container_hint("https://cdn/x/stream"), "octet-stream");
    }
}
