//! # Event Bus System
//!
//! Event-driven architecture for the client core using `tokio::sync::broadcast`.
//! State machines (session store, transport, purchase orchestrator) emit typed
//! events so that host UIs can render progress without polling core state.
//!
//! ## Overview
//!
//! The event bus system consists of:
//! - **Event Types**: Strongly-typed enum hierarchies per domain
//! - **EventBus**: Central broadcast channel for publishing events
//! - **EventStream**: Wrapper for consuming events with filtering
//!
//! ## Usage
//!
//! ```rust
//! use core_runtime::events::{EventBus, CoreEvent, PlaybackEvent};
//!
//! let event_bus = EventBus::new(100);
//! let mut sub = event_bus.subscribe();
//!
//! event_bus
//!     .emit(CoreEvent::Playback(PlaybackEvent::Started {
//!         track_id: "track-1".to_string(),
//!     }))
//!     .ok();
//! ```
//!
//! ## Error Handling
//!
//! `tokio::sync::broadcast` produces two receive errors:
//!
//! - **`RecvError::Lagged(n)`**: subscriber was too slow and missed `n`
//!   events. Non-fatal; the subscriber keeps receiving new events.
//! - **`RecvError::Closed`**: all senders dropped. Treat as shutdown.
//!
//! Playback and purchase failures are independent failure domains: an error
//! event in one never implies anything about the other.

use serde::{Deserialize, Serialize};
use std::fmt;
use tokio::sync::broadcast;

// Re-export commonly used types
pub use tokio::sync::broadcast::error::{RecvError, SendError};
pub use tokio::sync::broadcast::Receiver;

/// Default buffer size for the event bus channel.
pub const DEFAULT_EVENT_BUFFER_SIZE: usize = 100;

// ============================================================================
// Core Event Types
// ============================================================================

/// Top-level event enum encompassing all event categories.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", content = "payload")]
pub enum CoreEvent {
    /// Session-state events (selection, volume, modes)
    Session(SessionEvent),
    /// Playback/transport events
    Playback(PlaybackEvent),
    /// Purchase-flow events
    Purchase(PurchaseEvent),
}

impl CoreEvent {
    /// Returns a human-readable description of the event.
    pub fn description(&self) -> &str {
        match self {
            CoreEvent::Session(e) => e.description(),
            CoreEvent::Playback(e) => e.description(),
            CoreEvent::Purchase(e) => e.description(),
        }
    }

    /// Returns the severity level of the event.
    pub fn severity(&self) -> EventSeverity {
        match self {
            CoreEvent::Playback(PlaybackEvent::StreamUnavailable { .. }) => EventSeverity::Error,
            CoreEvent::Purchase(PurchaseEvent::Failed { .. }) => EventSeverity::Error,
            CoreEvent::Purchase(PurchaseEvent::NoGatewayForCurrency { .. }) => {
                EventSeverity::Warning
            }
            CoreEvent::Playback(PlaybackEvent::Started { .. }) => EventSeverity::Info,
            CoreEvent::Purchase(PurchaseEvent::Succeeded { .. }) => EventSeverity::Info,
            _ => EventSeverity::Debug,
        }
    }
}

/// Event severity levels for filtering and logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum EventSeverity {
    /// Debug-level events (verbose)
    Debug,
    /// Informational events
    Info,
    /// Warning events
    Warning,
    /// Error events
    Error,
}

// ============================================================================
// Session Events
// ============================================================================

/// Events emitted by the session store when user-facing state changes.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "event")]
pub enum SessionEvent {
    /// A track became the current selection (restart semantics, even when
    /// re-selecting the same track).
    TrackSelected {
        /// The newly selected track.
        track_id: String,
        /// The refresh token minted for this selection.
        refresh_token: u64,
    },
    /// Volume changed (already clamped to `[0.0, 1.0]`).
    VolumeChanged {
        /// The new volume.
        volume: f32,
    },
    /// Mute toggled without changing the stored volume.
    MuteChanged {
        /// Whether output is muted now.
        muted: bool,
    },
    /// Shuffle turned on or off.
    ShuffleChanged {
        /// Whether shuffle is enabled now.
        enabled: bool,
    },
    /// Repeat mode changed.
    RepeatChanged {
        /// New mode as its wire name (`off`, `one`, `all`).
        mode: String,
    },
    /// The playback context (queue boundary) was replaced.
    ContextChanged {
        /// Context kind (`all`, `album`, `artist`, `feed`).
        kind: String,
        /// Number of tracks in the new context.
        track_count: usize,
    },
    /// The session was reset (sign-out), preserving persisted preferences.
    SessionReset,
}

impl SessionEvent {
    fn description(&self) -> &str {
        match self {
            SessionEvent::TrackSelected { .. } => "Track selected",
            SessionEvent::VolumeChanged { .. } => "Volume changed",
            SessionEvent::MuteChanged { .. } => "Mute toggled",
            SessionEvent::ShuffleChanged { .. } => "Shuffle mode changed",
            SessionEvent::RepeatChanged { .. } => "Repeat mode changed",
            SessionEvent::ContextChanged { .. } => "Playback context changed",
            SessionEvent::SessionReset => "Session reset",
        }
    }
}

// ============================================================================
// Playback Events
// ============================================================================

/// Events related to transport and streaming attachment state.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "event")]
pub enum PlaybackEvent {
    /// Playback started (or resumed).
    Started {
        /// The track being played.
        track_id: String,
    },
    /// Playback paused.
    Paused {
        /// The track.
        track_id: String,
        /// Position when paused, in seconds.
        position_seconds: f64,
    },
    /// The streaming attachment finished loading and is ready to play.
    AttachmentReady {
        /// The attached track.
        track_id: String,
    },
    /// The sink learned the track duration.
    DurationKnown {
        /// The track.
        track_id: String,
        /// Duration in seconds.
        seconds: f64,
    },
    /// Playback position advanced.
    PositionChanged {
        /// Current position in seconds.
        position_seconds: f64,
        /// Known duration in seconds (0 until reported).
        duration_seconds: f64,
    },
    /// The current track played to its end.
    TrackCompleted {
        /// The completed track.
        track_id: String,
    },
    /// The manifest for a track could not be loaded. Scoped to that track;
    /// the session itself stays alive and reselecting the track retries.
    StreamUnavailable {
        /// The affected track.
        track_id: String,
        /// Human-readable reason.
        message: String,
    },
}

impl PlaybackEvent {
    fn description(&self) -> &str {
        match self {
            PlaybackEvent::Started { .. } => "Playback started",
            PlaybackEvent::Paused { .. } => "Playback paused",
            PlaybackEvent::AttachmentReady { .. } => "Stream attachment ready",
            PlaybackEvent::DurationKnown { .. } => "Track duration known",
            PlaybackEvent::PositionChanged { .. } => "Playback position changed",
            PlaybackEvent::TrackCompleted { .. } => "Track completed",
            PlaybackEvent::StreamUnavailable { .. } => "Stream unavailable",
        }
    }
}

// ============================================================================
// Purchase Events
// ============================================================================

/// Events emitted by the purchase orchestrator as the flow advances.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "event")]
pub enum PurchaseEvent {
    /// A purchase flow was accepted and started.
    FlowStarted {
        /// Item type (`song`, `album`, `artist-subscription`).
        item_type: String,
        /// The item.
        item_id: String,
    },
    /// More than one currency quote exists; the user must choose.
    CurrencySelectionRequired {
        /// The item.
        item_id: String,
        /// Available ISO-4217 codes.
        currencies: Vec<String>,
    },
    /// A currency is chosen; the user must pick a gateway that supports it.
    GatewaySelectionRequired {
        /// The item.
        item_id: String,
        /// The chosen currency.
        currency: String,
        /// Gateway ids able to settle in that currency.
        gateways: Vec<String>,
    },
    /// No configured gateway supports the chosen currency; the flow returned
    /// to currency selection.
    NoGatewayForCurrency {
        /// The rejected currency.
        currency: String,
    },
    /// A checkout intent was issued and handed to the gateway UI.
    CheckoutPending {
        /// Server-assigned intent id.
        intent_id: String,
        /// Amount in the chosen currency.
        amount: f64,
        /// The chosen currency.
        currency: String,
    },
    /// The gateway reported success and the local ledger was updated.
    Succeeded {
        /// Item type.
        item_type: String,
        /// The purchased item.
        item_id: String,
    },
    /// The gateway or the intent request failed. Retry is user-triggered.
    Failed {
        /// The item.
        item_id: String,
        /// Message surfaced to the user.
        message: String,
    },
    /// The user dismissed the gateway UI. Silent; entitlement untouched.
    Cancelled {
        /// The item.
        item_id: String,
    },
    /// Purchasing this item first requires subscribing to its artist; the
    /// subscription sub-flow is starting.
    SubscriptionPrerequisite {
        /// The originally requested item.
        item_id: String,
        /// The artist whose subscription is required first.
        artist_id: String,
    },
}

impl PurchaseEvent {
    fn description(&self) -> &str {
        match self {
            PurchaseEvent::FlowStarted { .. } => "Purchase flow started",
            PurchaseEvent::CurrencySelectionRequired { .. } => "Currency selection required",
            PurchaseEvent::GatewaySelectionRequired { .. } => "Gateway selection required",
            PurchaseEvent::NoGatewayForCurrency { .. } => "No gateway for currency",
            PurchaseEvent::CheckoutPending { .. } => "Checkout pending",
            PurchaseEvent::Succeeded { .. } => "Purchase succeeded",
            PurchaseEvent::Failed { .. } => "Purchase failed",
            PurchaseEvent::Cancelled { .. } => "Purchase cancelled",
            PurchaseEvent::SubscriptionPrerequisite { .. } => "Artist subscription required first",
        }
    }
}

// ============================================================================
// Event Bus
// ============================================================================

/// Central event bus for publishing and subscribing to events.
///
/// Uses `tokio::sync::broadcast` internally, which provides:
/// - Multiple producers (clone the `EventBus`)
/// - Multiple consumers (each `subscribe()` creates a new receiver)
/// - Non-blocking sends (events are cloned for each subscriber)
/// - Lagging detection (slow subscribers get `RecvError::Lagged`)
#[derive(Clone)]
pub struct EventBus {
    sender: broadcast::Sender<CoreEvent>,
}

impl EventBus {
    /// Creates a new event bus with the specified buffer size.
    ///
    /// # Arguments
    ///
    /// * `capacity` - Maximum number of events to buffer per subscriber.
    ///   When a subscriber falls behind by more than this amount, it will
    ///   receive a `RecvError::Lagged` error.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Creates a new event bus with the default buffer size.
    #[allow(clippy::should_implement_trait)]
    pub fn default() -> Self {
        Self::new(DEFAULT_EVENT_BUFFER_SIZE)
    }

    /// Publishes an event to all subscribers.
    ///
    /// Returns the number of subscribers that received the event.
    /// Returns an error if there are no active subscribers.
    pub fn emit(&self, event: CoreEvent) -> Result<usize, SendError<CoreEvent>> {
        self.sender.send(event)
    }

    /// Creates a new subscriber to receive events.
    ///
    /// Each call creates an independent receiver that will receive all future
    /// events. Past events are not replayed.
    pub fn subscribe(&self) -> Receiver<CoreEvent> {
        self.sender.subscribe()
    }

    /// Returns the number of active subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl fmt::Debug for EventBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventBus")
            .field("subscriber_count", &self.subscriber_count())
            .finish()
    }
}

// ============================================================================
// Event Stream Wrapper
// ============================================================================

/// Type alias for event filter functions.
type EventFilter = Box<dyn Fn(&CoreEvent) -> bool + Send + Sync>;

/// A wrapper around `broadcast::Receiver` with additional filtering.
///
/// # Example
///
/// ```rust
/// use core_runtime::events::{EventBus, EventStream, CoreEvent};
///
/// let event_bus = EventBus::new(100);
/// let purchases = EventStream::new(event_bus.subscribe())
///     .filter(|event| matches!(event, CoreEvent::Purchase(_)));
/// ```
pub struct EventStream {
    receiver: Receiver<CoreEvent>,
    filter: Option<EventFilter>,
}

impl EventStream {
    /// Creates a new event stream from a receiver.
    pub fn new(receiver: Receiver<CoreEvent>) -> Self {
        Self {
            receiver,
            filter: None,
        }
    }

    /// Adds a filter function to this stream.
    ///
    /// Only events that match the filter will be returned by `recv()`.
    pub fn filter<F>(mut self, predicate: F) -> Self
    where
        F: Fn(&CoreEvent) -> bool + Send + Sync + 'static,
    {
        self.filter = Some(Box::new(predicate));
        self
    }

    /// Receives the next event that passes the filter (if any).
    ///
    /// # Errors
    ///
    /// Returns `RecvError::Lagged(n)` if the subscriber fell behind by `n`
    /// events. Returns `RecvError::Closed` if all senders have been dropped.
    pub async fn recv(&mut self) -> Result<CoreEvent, RecvError> {
        loop {
            let event = self.receiver.recv().await?;

            let Some(filter) = &self.filter else {
                return Ok(event);
            };

            if filter(&event) {
                return Ok(event);
            }
        }
    }

    /// Attempts to receive an event without blocking.
    ///
    /// Returns `None` if no events are currently available.
    pub fn try_recv(&mut self) -> Option<Result<CoreEvent, RecvError>> {
        loop {
            match self.receiver.try_recv() {
                Ok(event) => {
                    let Some(filter) = &self.filter else {
                        return Some(Ok(event));
                    };

                    if filter(&event) {
                        return Some(Ok(event));
                    }
                }
                Err(broadcast::error::TryRecvError::Empty) => return None,
                Err(broadcast::error::TryRecvError::Lagged(n)) => {
                    return Some(Err(RecvError::Lagged(n)))
                }
                Err(broadcast::error::TryRecvError::Closed) => return Some(Err(RecvError::Closed)),
            }
        }
    }
}

impl fmt::Debug for EventStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventStream")
            .field("has_filter", &self.filter.is_some())
            .finish()
    }
}

// ============================================================================
// Tests
// ============================================================================
