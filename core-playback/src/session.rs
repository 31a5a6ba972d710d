//! # Playback Session Store
//!
//! Holds the single reactive session state per signed-in user: selected
//! track, transport flags, volume, shuffle/repeat modes, and the playback
//! context. A subset of the state is durable (volume, default track id,
//! context, shuffle and repeat modes) and is written through the
//! [`SettingsStore`] bridge on every change; the rest is session-only.
//!
//! Persistence is strictly best-effort. A write failure is logged and the
//! in-memory state still advances; a corrupt persisted value hydrates as the
//! default without surfacing an error.
//!
//! State changes are published twice: as typed [`SessionEvent`]s on the
//! event bus, and as full snapshots on a `tokio::sync::watch` channel so
//! host UIs can render without diffing events.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;
use rand::seq::SliceRandom;
use rand::thread_rng;
use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tracing::{debug, warn};

use bridge_traits::storage::SettingsStore;
use core_catalog::types::Track;
use core_runtime::events::{CoreEvent, EventBus, SessionEvent};

use crate::queue::{generate_shuffle_order, PlaybackContext};

// ============================================================================
// Persistence Keys
// ============================================================================

const KEY_VOLUME: &str = "session.volume";
const KEY_DEFAULT_TRACK: &str = "session.default_track_id";
const KEY_CONTEXT: &str = "session.context";
const KEY_SHUFFLE: &str = "session.shuffle_mode";
const KEY_REPEAT: &str = "session.repeat_mode";

// ============================================================================
// Repeat Mode
// ============================================================================

/// What happens when the current track plays to its end.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RepeatMode {
    /// Advance through the order; stop after the last track.
    #[default]
    Off,
    /// Replay the current track indefinitely.
    One,
    /// Advance through the order, wrapping past the end.
    All,
}

impl RepeatMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            RepeatMode::Off => "off",
            RepeatMode::One => "one",
            RepeatMode::All => "all",
        }
    }

    fn parse(value: &str) -> Option<Self> {
        match value {
            "off" => Some(RepeatMode::Off),
            "one" => Some(RepeatMode::One),
            "all" => Some(RepeatMode::All),
            _ => None,
        }
    }
}

// ============================================================================
// Session State
// ============================================================================

/// Full snapshot of one playback session.
#[derive(Debug, Clone, PartialEq)]
pub struct PlaybackSession {
    /// The explicitly selected track, if any.
    pub selected_track: Option<Track>,
    /// Fallback track id shown when nothing is selected. Frozen on first
    /// resolution so the UI stays stable across renders.
    pub default_track_id: Option<String>,
    /// Transport intent (the sink may still be buffering).
    pub is_playing: bool,
    /// Sink-reported position in seconds.
    pub current_time_seconds: f64,
    /// Sink-reported duration in seconds; 0 until known.
    pub duration_seconds: f64,
    /// Output volume in `[0.0, 1.0]`.
    pub volume: f32,
    /// Mute flag, independent of `volume`. Session-only.
    pub is_muted: bool,
    /// Whether the shuffle order replaces the context order.
    pub shuffle_mode: bool,
    /// End-of-track behavior.
    pub repeat_mode: RepeatMode,
    /// Current shuffle permutation; empty whenever shuffle is off.
    pub shuffle_order: Vec<String>,
    /// Monotonic token identifying the latest selection. Stale async work
    /// compares against this and discards itself.
    pub refresh_token: u64,
    /// The queue boundary for next/previous.
    pub context: PlaybackContext,
}

impl Default for PlaybackSession {
    fn default() -> Self {
        Self {
            selected_track: None,
            default_track_id: None,
            is_playing: false,
            current_time_seconds: 0.0,
            duration_seconds: 0.0,
            volume: 1.0,
            is_muted: false,
            shuffle_mode: false,
            repeat_mode: RepeatMode::Off,
            shuffle_order: Vec::new(),
            refresh_token: 0,
            context: PlaybackContext::default(),
        }
    }
}

impl PlaybackSession {
    /// Id of the explicitly selected track.
    pub fn selected_track_id(&self) -> Option<&str> {
        self.selected_track.as_ref().map(|t| t.id.as_str())
    }

    /// Id of the track the UI should display: the selection, else the
    /// frozen default.
    pub fn display_track_id(&self) -> Option<&str> {
        self.selected_track_id().or(self.default_track_id.as_deref())
    }

    /// The order next/previous walk: the shuffle permutation when shuffle is
    /// on, the context order otherwise.
    pub fn active_order(&self) -> &[String] {
        if self.shuffle_mode {
            &self.shuffle_order
        } else {
            &self.context.track_ids
        }
    }
}

// ============================================================================
// Session Store
// ============================================================================

/// Owner of the mutable session state.
///
/// All mutation goes through this store so every change is persisted (where
/// durable), published on the watch channel, and emitted as an event in one
/// place. Methods never fail: persistence errors degrade to warnings.
pub struct SessionStore {
    state: RwLock<PlaybackSession>,
    snapshot_tx: watch::Sender<PlaybackSession>,
    settings: Arc<dyn SettingsStore>,
    events: EventBus,
    /// Source of refresh tokens. Survives `reset()` so tokens stay
    /// monotonic across sign-outs.
    token_counter: AtomicU64,
}

impl SessionStore {
    /// Build a store from persisted preferences.
    ///
    /// Reads each durable key once; a missing or corrupt value falls back to
    /// its default silently (debug-logged only).
    pub async fn hydrate(settings: Arc<dyn SettingsStore>, events: EventBus) -> Arc<Self> {
        let mut session = PlaybackSession::default();

        match settings.get_f64(KEY_VOLUME).await {
            Ok(Some(volume)) if volume.is_finite() => {
                session.volume = (volume as f32).clamp(0.0, 1.0);
            }
            Ok(_) => {}
            Err(error) => debug!(%error, "volume preference unreadable, using default"),
        }

        match settings.get_string(KEY_DEFAULT_TRACK).await {
            Ok(Some(id)) if !id.is_empty() => session.default_track_id = Some(id),
            Ok(_) => {}
            Err(error) => debug!(%error, "default track preference unreadable"),
        }

        match settings.get_string(KEY_CONTEXT).await {
            Ok(Some(raw)) => match serde_json::from_str::<PlaybackContext>(&raw) {
                Ok(context) => session.context = context,
                Err(error) => debug!(%error, "persisted context corrupt, using default"),
            },
            Ok(None) => {}
            Err(error) => debug!(%error, "context preference unreadable"),
        }

        match settings.get_bool(KEY_SHUFFLE).await {
            Ok(Some(enabled)) => session.shuffle_mode = enabled,
            Ok(None) => {}
            Err(error) => debug!(%error, "shuffle preference unreadable"),
        }

        match settings.get_string(KEY_REPEAT).await {
            Ok(Some(raw)) => match RepeatMode::parse(&raw) {
                Some(mode) => session.repeat_mode = mode,
                None => debug!(value = %raw, "persisted repeat mode unrecognized"),
            },
            Ok(None) => {}
            Err(error) => debug!(%error, "repeat preference unreadable"),
        }

        // A persisted shuffle flag needs a fresh permutation; the order
        // itself is never persisted.
        if session.shuffle_mode {
            session.shuffle_order = generate_shuffle_order(&session.context);
        }

        let (snapshot_tx, _) = watch::channel(session.clone());
        Arc::new(Self {
            state: RwLock::new(session),
            snapshot_tx,
            settings,
            events,
            token_counter: AtomicU64::new(0),
        })
    }

    /// A point-in-time copy of the session.
    pub fn snapshot(&self) -> PlaybackSession {
        self.state.read().clone()
    }

    /// Subscribe to full-state snapshots.
    pub fn subscribe(&self) -> watch::Receiver<PlaybackSession> {
        self.snapshot_tx.subscribe()
    }

    /// The token of the latest selection.
    pub fn current_refresh_token(&self) -> u64 {
        self.state.read().refresh_token
    }

    // ------------------------------------------------------------------
    // Selection
    // ------------------------------------------------------------------

    /// Make `track` the current selection and mint a new refresh token.
    ///
    /// Restart semantics: re-selecting the already selected track still
    /// resets position and mints a fresh token.
    pub fn select_track(&self, track: Track) -> u64 {
        let token = self.token_counter.fetch_add(1, Ordering::SeqCst) + 1;
        let track_id = track.id.clone();

        {
            let mut state = self.state.write();
            state.selected_track = Some(track);
            state.is_playing = true;
            state.current_time_seconds = 0.0;
            state.duration_seconds = 0.0;
            state.refresh_token = token;
        }

        self.publish();
        self.emit(SessionEvent::TrackSelected {
            track_id,
            refresh_token: token,
        });
        token
    }

    /// Resolve which track the UI should display, freezing a random default
    /// when nothing is selected yet.
    ///
    /// `candidates` is the pool to draw the default from (typically the
    /// current context or the feed). The chosen default persists so the same
    /// track keeps showing across restarts.
    pub async fn resolve_display_track(&self, candidates: &[String]) -> Option<String> {
        if let Some(id) = self.state.read().display_track_id() {
            return Some(id.to_string());
        }
        let chosen = candidates.choose(&mut thread_rng())?.clone();
        self.force_default_track(&chosen).await;
        Some(chosen)
    }

    /// Set the frozen default track id and persist it.
    pub async fn force_default_track(&self, track_id: &str) {
        self.state.write().default_track_id = Some(track_id.to_string());
        self.publish();
        if let Err(error) = self.settings.set_string(KEY_DEFAULT_TRACK, track_id).await {
            warn!(%error, "failed to persist default track id");
        }
    }

    /// Clear the frozen default (e.g. when the track left the catalog).
    pub async fn clear_default_track(&self) {
        self.state.write().default_track_id = None;
        self.publish();
        if let Err(error) = self.settings.remove(KEY_DEFAULT_TRACK).await {
            warn!(%error, "failed to clear default track id");
        }
    }

    // ------------------------------------------------------------------
    // Transport flags
    // ------------------------------------------------------------------

    pub fn set_playing(&self, playing: bool) {
        self.state.write().is_playing = playing;
        self.publish();
    }

    /// Record sink-reported progress. The sink is authoritative for time and
    /// duration; nothing here is persisted.
    pub fn set_progress(&self, time_seconds: f64, duration_seconds: f64) {
        {
            let mut state = self.state.write();
            state.current_time_seconds = time_seconds;
            if duration_seconds > 0.0 {
                state.duration_seconds = duration_seconds;
            }
        }
        self.publish();
    }

    /// Record a sink- or manifest-reported duration.
    pub fn set_duration(&self, duration_seconds: f64) {
        self.state.write().duration_seconds = duration_seconds;
        self.publish();
    }

    // ------------------------------------------------------------------
    // Volume / mute
    // ------------------------------------------------------------------

    /// Set the volume, clamped to `[0.0, 1.0]`. Non-finite input clamps
    /// to 0. Persisted.
    pub async fn set_volume(&self, volume: f32) {
        let volume = if volume.is_finite() {
            volume.clamp(0.0, 1.0)
        } else {
            0.0
        };

        self.state.write().volume = volume;
        self.publish();
        self.emit(SessionEvent::VolumeChanged { volume });

        if let Err(error) = self.settings.set_f64(KEY_VOLUME, f64::from(volume)).await {
            warn!(%error, "failed to persist volume");
        }
    }

    /// Toggle mute without touching the stored volume. Session-only.
    pub fn set_muted(&self, muted: bool) {
        self.state.write().is_muted = muted;
        self.publish();
        self.emit(SessionEvent::MuteChanged { muted });
    }

    // ------------------------------------------------------------------
    // Shuffle / repeat / context
    // ------------------------------------------------------------------

    /// Enable or disable shuffle. The off-to-on transition generates a fresh
    /// permutation; turning shuffle off discards the order. A redundant call
    /// in the current mode is a no-op and keeps the existing order. Persisted.
    pub async fn set_shuffle_mode(&self, enabled: bool) {
        {
            let mut state = self.state.write();
            if state.shuffle_mode == enabled {
                return;
            }
            state.shuffle_mode = enabled;
            state.shuffle_order = if enabled {
                generate_shuffle_order(&state.context)
            } else {
                Vec::new()
            };
        }
        self.publish();
        self.emit(SessionEvent::ShuffleChanged { enabled });

        if let Err(error) = self.settings.set_bool(KEY_SHUFFLE, enabled).await {
            warn!(%error, "failed to persist shuffle mode");
        }
    }

    /// Change the end-of-track behavior. Persisted.
    pub async fn set_repeat_mode(&self, mode: RepeatMode) {
        self.state.write().repeat_mode = mode;
        self.publish();
        self.emit(SessionEvent::RepeatChanged {
            mode: mode.as_str().to_string(),
        });

        if let Err(error) = self.settings.set_string(KEY_REPEAT, mode.as_str()).await {
            warn!(%error, "failed to persist repeat mode");
        }
    }

    /// Replace the playback context. Regenerates the shuffle order when
    /// shuffle is on. Persisted as JSON.
    pub async fn set_context(&self, context: PlaybackContext) {
        let (kind, track_count) = (context.kind, context.track_ids.len());
        {
            let mut state = self.state.write();
            if state.shuffle_mode {
                state.shuffle_order = generate_shuffle_order(&context);
            }
            state.context = context.clone();
        }
        self.publish();
        self.emit(SessionEvent::ContextChanged {
            kind: kind.as_str().to_string(),
            track_count,
        });

        match serde_json::to_string(&context) {
            Ok(json) => {
                if let Err(error) = self.settings.set_string(KEY_CONTEXT, &json).await {
                    warn!(%error, "failed to persist playback context");
                }
            }
            Err(error) => warn!(%error, "failed to serialize playback context"),
        }
    }

    // ------------------------------------------------------------------
    // Reset
    // ------------------------------------------------------------------

    /// Reset the session for sign-out.
    ///
    /// Durable preferences survive (volume, default track, context, shuffle
    /// and repeat modes); selection, transport flags, and the shuffle order
    /// are discarded. The token counter keeps counting so tokens minted
    /// after a reset still outrank tokens minted before it.
    pub fn reset(&self) {
        {
            let mut state = self.state.write();
            let preserved = PlaybackSession {
                volume: state.volume,
                default_track_id: state.default_track_id.take(),
                context: std::mem::take(&mut state.context),
                shuffle_mode: state.shuffle_mode,
                repeat_mode: state.repeat_mode,
                refresh_token: state.refresh_token,
                ..PlaybackSession::default()
            };
            *state = preserved;
        }
        self.publish();
        self.emit(SessionEvent::SessionReset);
    }

    // ------------------------------------------------------------------
    // Internal
    // ------------------------------------------------------------------

    fn publish(&self) {
        let snapshot = self.state.read().clone();
        // send_replace never fails even with zero receivers.
        self.snapshot_tx.send_replace(snapshot);
    }

    fn emit(&self, event: SessionEvent) {
        // No subscribers is fine; events are advisory.
        self.events.emit(CoreEvent::Session(event)).ok();
    }
}

impl std::fmt::Debug for SessionStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.read();
        f.debug_struct("SessionStore")
            .field("selected", &state.selected_track_id())
            .field("is_playing", &state.is_playing)
            .field("refresh_token", &state.refresh_token)
            .finish()
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::queue::ContextKind;
    use bridge_traits::memory::MemorySettingsStore;
    use core_catalog::types::{AccessType, Price};

    fn track(id: &str) -> Track {
        Track {
            id: id.to_string(),
            title: format!("Track {id}"),
            artist_id: "artist-1".to_string(),
            album_id: None,
            duration_seconds: 180.0,
            streaming_manifest_url: format!("https://cdn.example.com/{id}/master.m3u8"),
            access_type: AccessType::Free,
            base_price: Price {
                currency: "USD".to_string(),
                amount: 0.0,
            },
            converted_prices: Vec::new(),
        }
    }

    fn context(ids: &[&str]) -> PlaybackContext {
        PlaybackContext {
            kind: ContextKind::Feed,
            context_id: None,
            track_ids: ids.iter().map(|s| s.to_string()).collect(),
        }
    }

    async fn store() -> (Arc<SessionStore>, Arc<MemorySettingsStore>) {
        let settings = Arc::new(MemorySettingsStore::new());
        let events = EventBus::new(64);
        let store = SessionStore::hydrate(settings.clone(), events).await;
        (store, settings)
    }

    #[tokio::test]
    async fn select_track_mints_monotonic_tokens_and_resets_position() {
        let (store, _) = store().await;

        let t1 = store.select_track(track("a"));
        store.set_progress(42.0, 180.0);

        let t2 = store.select_track(track("a"));
        assert!(t2 > t1, "re-selection mints a fresh token");

        let snap = store.snapshot();
        assert_eq!(snap.current_time_seconds, 0.0);
        assert_eq!(snap.duration_seconds, 0.0);
        assert!(snap.is_playing);
    }

    #[tokio::test]
    async fn volume_is_clamped_and_persisted() {
        let (store, settings) = store().await;

        store.set_volume(1.7).await;
        assert_eq!(store.snapshot().volume, 1.0);

        store.set_volume(-0.3).await;
        assert_eq!(store.snapshot().volume, 0.0);

        store.set_volume(f32::NAN).await;
        assert_eq!(store.snapshot().volume, 0.0);

        store.set_volume(0.55).await;
        let persisted = settings.get_f64(KEY_VOLUME).await.unwrap().unwrap();
        assert!((persisted - 0.55).abs() < 1e-6);
    }

    #[tokio::test]
    async fn mute_does_not_touch_volume_or_storage() {
        let (store, settings) = store().await;
        store.set_volume(0.8).await;

        store.set_muted(true);
        let snap = store.snapshot();
        assert!(snap.is_muted);
        assert!((snap.volume - 0.8).abs() < 1e-6);

        // Nothing written for mute.
        let keys = settings.keys().await.unwrap();
        assert!(!keys.iter().any(|k| k.contains("mute")));
    }

    #[tokio::test]
    async fn shuffle_toggle_generates_and_discards_order() {
        let (store, _) = store().await;
        store.set_context(context(&["a", "b", "c", "d"])).await;

        store.set_shuffle_mode(true).await;
        let snap = store.snapshot();
        let mut sorted = snap.shuffle_order.clone();
        sorted.sort();
        assert_eq!(sorted, vec!["a", "b", "c", "d"]);
        assert_eq!(snap.active_order(), snap.shuffle_order.as_slice());

        store.set_shuffle_mode(false).await;
        let snap = store.snapshot();
        assert!(snap.shuffle_order.is_empty());
        assert_eq!(snap.active_order(), snap.context.track_ids.as_slice());
    }

    #[tokio::test]
    async fn redundant_shuffle_enable_keeps_the_existing_order() {
        let ids: Vec<String> = (0..26).map(|i| format!("t{i}")).collect();
        let id_refs: Vec<&str> = ids.iter().map(String::as_str).collect();
        let (store, _) = store().await;
        store.set_context(context(&id_refs)).await;

        store.set_shuffle_mode(true).await;
        let order = store.snapshot().shuffle_order;

        store.set_shuffle_mode(true).await;
        assert_eq!(
            store.snapshot().shuffle_order,
            order,
            "enabling shuffle while already on must not reshuffle"
        );
    }

    #[tokio::test]
    async fn context_replacement_regenerates_shuffle_order() {
        let (store, _) = store().await;
        store.set_context(context(&["a", "b"])).await;
        store.set_shuffle_mode(true).await;

        store.set_context(context(&["x", "y", "z"])).await;
        let mut order = store.snapshot().shuffle_order;
        order.sort();
        assert_eq!(order, vec!["x", "y", "z"]);
    }

    #[tokio::test]
    async fn hydration_restores_preferences_and_tolerates_corruption() {
        let settings = Arc::new(MemorySettingsStore::new());
        settings.set_f64(KEY_VOLUME, 0.4).await.unwrap();
        settings.set_bool(KEY_SHUFFLE, true).await.unwrap();
        settings.set_string(KEY_REPEAT, "all").await.unwrap();
        settings
            .set_string(KEY_DEFAULT_TRACK, "song-7")
            .await
            .unwrap();
        let ctx = context(&["a", "b", "c"]);
        settings
            .set_string(KEY_CONTEXT, &serde_json::to_string(&ctx).unwrap())
            .await
            .unwrap();

        let store = SessionStore::hydrate(settings.clone(), EventBus::new(16)).await;
        let snap = store.snapshot();
        assert!((snap.volume - 0.4).abs() < 1e-6);
        assert!(snap.shuffle_mode);
        assert_eq!(snap.repeat_mode, RepeatMode::All);
        assert_eq!(snap.default_track_id.as_deref(), Some("song-7"));
        assert_eq!(snap.context, ctx);
        assert_eq!(snap.shuffle_order.len(), 3, "order rebuilt on hydrate");

        // Corrupt context falls back silently.
        settings.seed_raw(KEY_CONTEXT, "{not json");
        settings.seed_raw(KEY_REPEAT, "sideways");
        let store = SessionStore::hydrate(settings, EventBus::new(16)).await;
        let snap = store.snapshot();
        assert_eq!(snap.context, PlaybackContext::default());
        assert_eq!(snap.repeat_mode, RepeatMode::Off);
    }

    #[tokio::test]
    async fn display_track_freezes_random_default() {
        let (store, settings) = store().await;
        let pool: Vec<String> = vec!["a".into(), "b".into(), "c".into()];

        let first = store.resolve_display_track(&pool).await.unwrap();
        assert!(pool.contains(&first));

        // Frozen: repeated calls return the same id.
        let second = store.resolve_display_track(&pool).await.unwrap();
        assert_eq!(first, second);

        let persisted = settings.get_string(KEY_DEFAULT_TRACK).await.unwrap();
        assert_eq!(persisted.as_deref(), Some(first.as_str()));
    }

    #[tokio::test]
    async fn display_track_prefers_selection_over_default() {
        let (store, _) = store().await;
        store.force_default_track("fallback").await;
        store.select_track(track("chosen"));

        let pool: Vec<String> = vec!["fallback".into()];
        let shown = store.resolve_display_track(&pool).await.unwrap();
        assert_eq!(shown, "chosen");
    }

    #[tokio::test]
    async fn reset_preserves_preferences_and_token_monotonicity() {
        let (store, _) = store().await;
        store.set_volume(0.6).await;
        store.set_context(context(&["a", "b"])).await;
        store.set_repeat_mode(RepeatMode::One).await;
        store.force_default_track("a").await;
        let before = store.select_track(track("a"));
        store.set_progress(30.0, 200.0);

        store.reset();

        let snap = store.snapshot();
        assert!(snap.selected_track.is_none());
        assert!(!snap.is_playing);
        assert_eq!(snap.current_time_seconds, 0.0);
        assert!((snap.volume - 0.6).abs() < 1e-6);
        assert_eq!(snap.repeat_mode, RepeatMode::One);
        assert_eq!(snap.default_track_id.as_deref(), Some("a"));
        assert_eq!(snap.context.track_ids, vec!["a", "b"]);

        let after = store.select_track(track("b"));
        assert!(after > before, "token counter survives reset");
    }

    #[tokio::test]
    async fn watch_channel_publishes_snapshots() {
        let (store, _) = store().await;
        let mut rx = store.subscribe();

        store.select_track(track("a"));
        rx.changed().await.unwrap();
        assert_eq!(rx.borrow().selected_track_id(), Some("a"));
    }

    #[tokio::test]
    async fn session_events_are_emitted() {
        let settings = Arc::new(MemorySettingsStore::new());
        let events = EventBus::new(32);
        let mut sub = events.subscribe();
        let store = SessionStore::hydrate(settings, events).await;

        store.select_track(track("a"));
        let event = sub.recv().await.unwrap();
        assert!(matches!(
            event,
            CoreEvent::Session(SessionEvent::TrackSelected { ref track_id, .. }) if track_id == "a"
        ));

        store.set_muted(true);
        let event = sub.recv().await.unwrap();
        assert_eq!(
            event,
            CoreEvent::Session(SessionEvent::MuteChanged { muted: true })
        );
    }
}
