//! # Transport Controller
//!
//! User-facing playback commands and the sink event loop, implementing the
//! one-way reconciliation contract: the session store is authoritative for
//! volume, mute, and selection (pushed into the sink, never read back), and
//! the sink is authoritative for current time, duration, and the ended
//! signal (reported through events, never echoed back).
//!
//! Track completion routes through the repeat mode: `one` replays the
//! current track, `all` advances with wraparound, `off` advances until the
//! last track in the order and then stops.

use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, instrument, warn};

use bridge_traits::media::{MediaSink, MediaSinkEvent};
use core_catalog::types::Track;
use core_runtime::events::{CoreEvent, EventBus, PlaybackEvent};

use crate::attachment::StreamingAttachmentManager;
use crate::error::Result;
use crate::queue::{resolve_next, resolve_prev};
use crate::session::{RepeatMode, SessionStore};

/// Source of track metadata for queue navigation.
///
/// The controller resolves neighbor ids itself but needs full [`Track`]
/// records to select them; this seam keeps it independent of any concrete
/// catalog client.
#[async_trait]
pub trait TrackSource: Send + Sync {
    /// Fetch one track by id.
    ///
    /// # Errors
    ///
    /// Returns error when the track does not exist or cannot be fetched.
    async fn track(&self, id: &str) -> Result<Track>;
}

/// Playback command surface bound to one session.
pub struct TransportController {
    session: Arc<SessionStore>,
    attachment: Arc<StreamingAttachmentManager>,
    sink: Arc<dyn MediaSink>,
    tracks: Arc<dyn TrackSource>,
    events: EventBus,
    /// Volume to restore when unmuting via toggle.
    pre_mute_volume: Mutex<Option<f32>>,
}

impl TransportController {
    pub fn new(
        session: Arc<SessionStore>,
        attachment: Arc<StreamingAttachmentManager>,
        sink: Arc<dyn MediaSink>,
        tracks: Arc<dyn TrackSource>,
        events: EventBus,
    ) -> Self {
        Self {
            session,
            attachment,
            sink,
            tracks,
            events,
            pre_mute_volume: Mutex::new(None),
        }
    }

    // ------------------------------------------------------------------
    // Selection & play/pause
    // ------------------------------------------------------------------

    /// Select `track` and start playing it.
    ///
    /// Always restart semantics: selecting the already playing track resets
    /// it to the beginning with a fresh attachment.
    #[instrument(skip(self, track), fields(track_id = %track.id))]
    pub async fn select_track(&self, track: Track) -> Result<()> {
        let track_id = track.id.clone();
        let token = self.session.select_track(track.clone());

        self.attachment.attach(&track, token).await?;
        self.attachment.request_play(token).await?;

        // A newer selection may have superseded this one during the attach.
        if self.session.current_refresh_token() == token {
            self.emit(PlaybackEvent::Started { track_id });
        }
        Ok(())
    }

    /// Toggle between playing and paused.
    ///
    /// Resuming while the attachment is still loading defers the play until
    /// readiness rather than failing.
    pub async fn toggle_play(&self) -> Result<()> {
        let snap = self.session.snapshot();
        let Some(track_id) = snap.selected_track_id().map(str::to_string) else {
            // Nothing selected; toggling is a no-op.
            return Ok(());
        };

        if snap.is_playing {
            self.sink.pause().await?;
            self.session.set_playing(false);
            self.emit(PlaybackEvent::Paused {
                track_id,
                position_seconds: snap.current_time_seconds,
            });
        } else {
            self.session.set_playing(true);
            self.attachment.request_play(snap.refresh_token).await?;
            self.emit(PlaybackEvent::Started { track_id });
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // Queue navigation
    // ------------------------------------------------------------------

    /// Advance to the next track in the active order, wrapping around.
    ///
    /// No-op on an empty context.
    pub async fn next(&self) -> Result<()> {
        self.step(Direction::Forward).await
    }

    /// Go back to the previous track in the active order, wrapping around.
    pub async fn prev(&self) -> Result<()> {
        self.step(Direction::Backward).await
    }

    async fn step(&self, direction: Direction) -> Result<()> {
        let snap = self.session.snapshot();
        let order = snap.active_order();
        if order.is_empty() {
            debug!("queue navigation ignored, empty context");
            return Ok(());
        }

        // Without a selection, navigation starts from the displayed track.
        let current = snap
            .display_track_id()
            .map(str::to_string)
            .unwrap_or_default();

        let target = match direction {
            Direction::Forward => resolve_next(order, &current),
            Direction::Backward => resolve_prev(order, &current),
        };
        let Some(target_id) = target else {
            return Ok(());
        };

        let track = self.tracks.track(&target_id).await?;
        self.select_track(track).await
    }

    // ------------------------------------------------------------------
    // Seek / volume / mute
    // ------------------------------------------------------------------

    /// Seek to an absolute position, clamped to `[0, duration]`.
    pub async fn seek(&self, seconds: f64) -> Result<()> {
        let duration = self.session.snapshot().duration_seconds;
        let target = if duration > 0.0 {
            seconds.clamp(0.0, duration)
        } else {
            seconds.max(0.0)
        };
        self.sink.seek(target).await?;
        Ok(())
    }

    /// Set volume from a 0–100 percentage (UI convention). Clamped.
    pub async fn set_volume_percent(&self, percent: f32) -> Result<()> {
        let volume = (percent / 100.0).clamp(0.0, 1.0);
        let volume = if volume.is_finite() { volume } else { 0.0 };
        self.session.set_volume(volume).await;
        self.sink.set_volume(volume).await?;
        // Any explicit volume change invalidates the remembered pre-mute
        // level.
        *self.pre_mute_volume.lock() = None;
        Ok(())
    }

    /// Toggle mute, restoring the pre-mute volume on unmute.
    pub async fn toggle_mute(&self) -> Result<()> {
        let snap = self.session.snapshot();
        if snap.is_muted {
            self.session.set_muted(false);
            self.sink.set_muted(false).await?;
            if let Some(volume) = self.pre_mute_volume.lock().take() {
                self.session.set_volume(volume).await;
                self.sink.set_volume(volume).await?;
            }
        } else {
            *self.pre_mute_volume.lock() = Some(snap.volume);
            self.session.set_muted(true);
            self.sink.set_muted(true).await?;
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // Sink event loop
    // ------------------------------------------------------------------

    /// Spawn the loop draining sink events into the session.
    ///
    /// Runs until the sink drops its sender. Dropping the returned handle
    /// detaches the task; aborting it is the explicit shutdown.
    pub fn spawn_event_loop(self: &Arc<Self>) -> JoinHandle<()> {
        let controller = Arc::clone(self);
        let mut receiver = controller.sink.subscribe();
        tokio::spawn(async move {
            loop {
                match receiver.recv().await {
                    Ok(event) => controller.handle_sink_event(event).await,
                    Err(tokio::sync::broadcast::error::RecvError::Lagged(missed)) => {
                        // Position updates are idempotent; dropped ones are
                        // harmless.
                        debug!(missed, "sink event loop lagged");
                    }
                    Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
                }
            }
        })
    }

    async fn handle_sink_event(&self, event: MediaSinkEvent) {
        match event {
            MediaSinkEvent::DurationKnown { seconds } => {
                self.session.set_duration(seconds);
                if let Some(track_id) = self.selected_id() {
                    self.emit(PlaybackEvent::DurationKnown { track_id, seconds });
                }
            }
            MediaSinkEvent::TimeUpdate { seconds } => {
                let duration = self.session.snapshot().duration_seconds;
                self.session.set_progress(seconds, duration);
                self.emit(PlaybackEvent::PositionChanged {
                    position_seconds: seconds,
                    duration_seconds: duration,
                });
            }
            MediaSinkEvent::Ended => {
                if let Err(error) = self.on_track_ended().await {
                    warn!(%error, "advancing after track end failed");
                }
            }
            MediaSinkEvent::Error { message } => {
                if let Some(track_id) = self.selected_id() {
                    self.emit(PlaybackEvent::StreamUnavailable {
                        track_id,
                        message,
                    });
                }
                self.session.set_playing(false);
            }
        }
    }

    async fn on_track_ended(&self) -> Result<()> {
        let snap = self.session.snapshot();
        let Some(track_id) = snap.selected_track_id().map(str::to_string) else {
            return Ok(());
        };
        self.emit(PlaybackEvent::TrackCompleted {
            track_id: track_id.clone(),
        });

        match snap.repeat_mode {
            RepeatMode::One => {
                self.sink.seek(0.0).await?;
                self.sink.play().await?;
                Ok(())
            }
            RepeatMode::All => self.next().await,
            RepeatMode::Off => {
                let order = snap.active_order();
                let is_last = order.last().map(String::as_str) == Some(track_id.as_str());
                if is_last || order.is_empty() {
                    self.session.set_playing(false);
                    self.emit(PlaybackEvent::Paused {
                        track_id,
                        position_seconds: snap.duration_seconds,
                    });
                    Ok(())
                } else {
                    self.next().await
                }
            }
        }
    }

    fn selected_id(&self) -> Option<String> {
        self.session
            .snapshot()
            .selected_track_id()
            .map(str::to_string)
    }

    fn emit(&self, event: PlaybackEvent) {
        self.events.emit(CoreEvent::Playback(event)).ok();
    }
}

impl std::fmt::Debug for TransportController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransportController").finish_non_exhaustive()
    }
}

#[derive(Debug, Clone, Copy)]
enum Direction {
    Forward,
    Backward,
}
