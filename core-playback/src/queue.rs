//! Queue/Context Resolver
//!
//! Pure functions computing next/previous tracks and shuffle permutations
//! against a playback context. No state lives here; the session store owns
//! the context and the current shuffle order.

use rand::seq::SliceRandom;
use rand::thread_rng;
use serde::{Deserialize, Serialize};

/// The collection kind a listening session is scoped to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContextKind {
    /// The whole catalog feed.
    All,
    /// One album's track list.
    Album,
    /// One artist's catalog.
    Artist,
    /// A personalized feed.
    Feed,
}

impl ContextKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ContextKind::All => "all",
            ContextKind::Album => "album",
            ContextKind::Artist => "artist",
            ContextKind::Feed => "feed",
        }
    }
}

/// The ordered track collection defining next/previous for one session.
///
/// Persisted across reloads as part of the session's durable state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaybackContext {
    pub kind: ContextKind,
    /// Album or artist id when `kind` scopes to one; `None` for feeds.
    #[serde(default)]
    pub context_id: Option<String>,
    /// Ordered track ids, the queue boundary for next/prev.
    pub track_ids: Vec<String>,
}

impl Default for PlaybackContext {
    fn default() -> Self {
        Self {
            kind: ContextKind::All,
            context_id: None,
            track_ids: Vec::new(),
        }
    }
}

impl PlaybackContext {
    pub fn is_empty(&self) -> bool {
        self.track_ids.is_empty()
    }
}

/// Produce a fresh permutation of the context's track ids (Fisher–Yates).
///
/// Called on context replacement and on every shuffle off→on transition; the
/// result is always a permutation of `context.track_ids`, no duplicates, no
/// omissions.
pub fn generate_shuffle_order(context: &PlaybackContext) -> Vec<String> {
    let mut order = context.track_ids.clone();
    order.shuffle(&mut thread_rng());
    order
}

/// Resolve the track after `current` in the given order, wrapping around.
///
/// Returns `None` on an empty order. An id not present in the order defaults
/// to the first element.
pub fn resolve_next(order: &[String], current: &str) -> Option<String> {
    if order.is_empty() {
        return None;
    }
    match order.iter().position(|id| id == current) {
        Some(index) => Some(order[(index + 1) % order.len()].clone()),
        None => Some(order[0].clone()),
    }
}

/// Resolve the track before `current` in the given order, wrapping around.
///
/// Same defaulting rules as [`resolve_next`].
pub fn resolve_prev(order: &[String], current: &str) -> Option<String> {
    if order.is_empty() {
        return None;
    }
    match order.iter().position(|id| id == current) {
        Some(index) => Some(order[(index + order.len() - 1) % order.len()].clone()),
        None => Some(order[0].clone()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn context(ids: &[&str]) -> PlaybackContext {
        PlaybackContext {
            kind: ContextKind::Album,
            context_id: Some("album-1".to_string()),
            track_ids: ids.iter().map(|s| s.to_string()).collect(),
        }
    }

    #[test]
    fn shuffle_order_is_a_permutation() {
        let ctx = context(&["a", "b", "c", "d", "e", "f", "g"]);

        for _ in 0..20 {
            let mut order = generate_shuffle_order(&ctx);
            let mut expected = ctx.track_ids.clone();
            order.sort();
            expected.sort();
            assert_eq!(order, expected, "no duplicates, no omissions");
        }
    }

    #[test]
    fn shuffle_of_empty_context_is_empty() {
        let ctx = context(&[]);
        assert!(generate_shuffle_order(&ctx).is_empty());
    }

    #[test]
    fn next_and_prev_wrap_around() {
        let ctx = context(&["a", "b", "c"]);
        assert_eq!(resolve_next(&ctx.track_ids, "c").as_deref(), Some("a"));
        assert_eq!(resolve_prev(&ctx.track_ids, "a").as_deref(), Some("c"));
    }

    #[test]
    fn next_then_prev_returns_to_start() {
        let ctx = context(&["a", "b", "c"]);
        let next = resolve_next(&ctx.track_ids, "a").unwrap();
        let back = resolve_prev(&ctx.track_ids, &next).unwrap();
        assert_eq!(back, "a");
    }

    #[test]
    fn unknown_id_defaults_to_first() {
        let ctx = context(&["a", "b", "c"]);
        assert_eq!(
            resolve_next(&ctx.track_ids, "not-there").as_deref(),
            Some("a")
        );
        assert_eq!(
            resolve_prev(&ctx.track_ids, "not-there").as_deref(),
            Some("a")
        );
    }

    #[test]
    fn empty_order_resolves_to_none() {
        assert_eq!(resolve_next(&[], "a"), None);
        assert_eq!(resolve_prev(&[], "a"), None);
    }

    #[test]
    fn single_element_order_cycles_to_itself() {
        let order = vec!["only".to_string()];
        assert_eq!(resolve_next(&order, "only").as_deref(), Some("only"));
        assert_eq!(resolve_prev(&order, "only").as_deref(), Some("only"));
    }

    #[test]
    fn context_serde_roundtrip() {
        let ctx = context(&["a", "b"]);
        let json = serde_json::to_string(&ctx).unwrap();
        let parsed: PlaybackContext = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, ctx);
    }
}
