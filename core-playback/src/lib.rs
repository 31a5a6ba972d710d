//! # Playback Session Engine
//!
//! The stateful core of the streaming client: what plays, in what order, and
//! how the session stays synchronized with an adaptive-streaming transport.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────┐
//! │          TransportController                 │
//! │  play/pause/seek/next/prev/volume/mute       │
//! └───────┬───────────────┬──────────────┬───────┘
//!         │               │              │
//!         ▼               ▼              ▼
//! ┌──────────────┐ ┌─────────────┐ ┌───────────────────────┐
//! │ SessionStore │ │ queue       │ │ StreamingAttachment   │
//! │ (reactive,   │ │ (pure next/ │ │ Manager (one live     │
//! │  persisted)  │ │  prev/      │ │ adaptive client bound │
//! │              │ │  shuffle)   │ │ to the media sink)    │
//! └──────────────┘ └─────────────┘ └───────────────────────┘
//! ```
//!
//! ## Reconciliation contract
//!
//! The [`SessionStore`](session::SessionStore) is authoritative for volume,
//! selection and mute; the [`MediaSink`](bridge_traits::media::MediaSink) is
//! authoritative for current time, duration and the ended signal. Each
//! direction is pushed one way only, never echoed back, so no update cycle
//! can form.
//!
//! ## Ordering guarantee
//!
//! Track switches are last-writer-wins: every selection mints a monotonic
//! refresh token, and every resumption point of an in-flight attachment
//! compares its captured token against the session's current one. Stale
//! completions are ignored, and the prior attachment is destroyed before a
//! successor is created; two live decoders on one sink is forbidden.

pub mod attachment;
pub mod error;
pub mod queue;
pub mod session;
pub mod transport;

pub use attachment::{AttachmentStats, AttachmentStatus, StreamingAttachmentManager};
pub use error::{PlaybackError, Result};
pub use queue::{generate_shuffle_order, resolve_next, resolve_prev, ContextKind, PlaybackContext};
pub use session::{PlaybackSession, RepeatMode, SessionStore};
pub use transport::{TrackSource, TransportController};
