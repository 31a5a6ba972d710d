//! # Local Purchase Ledger
//!
//! The client-side mirror of the user's purchase state: hydrated from the
//! server profile, mutated only by orchestrator success, queried by the
//! entitlement resolver.
//!
//! Gateway-success updates are recorded *optimistically* (the server may not
//! have reconciled yet) and carry a provenance marker. If server-side
//! confirmation later disagrees with a gateway's success callback, the host
//! calls [`PurchaseLedger::revert_optimistic`] as an explicit compensating
//! step; the ledger never reverts on its own. Re-hydration replaces the
//! whole ledger with server truth.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tracing::debug;

use core_catalog::types::{ItemType, UserProfile};

/// Where a ledger entry came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Provenance {
    /// Present in the server-side profile.
    ServerConfirmed,
    /// Added locally on gateway success, pending server reconciliation.
    Optimistic,
}

/// One owned item in the ledger.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LedgerEntry {
    pub item_type: ItemType,
    pub item_id: String,
    pub provenance: Provenance,
    #[serde(default)]
    pub amount: Option<f64>,
    #[serde(default)]
    pub currency: Option<String>,
    pub recorded_at: DateTime<Utc>,
}

/// The purchased-ids set, keyed by `(item type, item id)`.
#[derive(Debug, Default)]
pub struct PurchaseLedger {
    entries: RwLock<HashMap<(ItemType, String), LedgerEntry>>,
}

impl PurchaseLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the ledger with the server-side purchase state.
    ///
    /// Optimistic entries not yet reflected server-side are dropped; the
    /// profile is the source of truth whenever it is fetched.
    pub fn hydrate_from_profile(&self, profile: &UserProfile) {
        let mut entries = HashMap::new();
        let now = Utc::now();

        for song_id in &profile.purchased_songs {
            entries.insert(
                (ItemType::Song, song_id.clone()),
                confirmed(ItemType::Song, song_id, now),
            );
        }
        for album_id in &profile.purchased_albums {
            entries.insert(
                (ItemType::Album, album_id.clone()),
                confirmed(ItemType::Album, album_id, now),
            );
        }
        for record in &profile.purchase_history {
            entries
                .entry((record.item_type, record.item_id.clone()))
                .or_insert_with(|| LedgerEntry {
                    item_type: record.item_type,
                    item_id: record.item_id.clone(),
                    provenance: Provenance::ServerConfirmed,
                    amount: record.amount,
                    currency: record.currency.clone(),
                    recorded_at: record.purchased_at.unwrap_or(now),
                });
        }

        debug!(count = entries.len(), "ledger hydrated from profile");
        *self.entries.write() = entries;
    }

    /// Whether the user owns the given item.
    pub fn owns(&self, item_type: ItemType, item_id: &str) -> bool {
        self.entries
            .read()
            .contains_key(&(item_type, item_id.to_string()))
    }

    /// Whether the user holds an artist-subscription for `artist_id`.
    ///
    /// Pure membership; expiry is server-enforced and not checked here.
    pub fn has_artist_subscription(&self, artist_id: &str) -> bool {
        self.owns(ItemType::ArtistSubscription, artist_id)
    }

    /// Record an optimistic purchase. Exactly-once: recording an item that
    /// is already owned changes nothing and returns `false`.
    pub fn record_optimistic(
        &self,
        item_type: ItemType,
        item_id: &str,
        amount: f64,
        currency: &str,
    ) -> bool {
        let mut entries = self.entries.write();
        let key = (item_type, item_id.to_string());
        if entries.contains_key(&key) {
            return false;
        }
        entries.insert(
            key,
            LedgerEntry {
                item_type,
                item_id: item_id.to_string(),
                provenance: Provenance::Optimistic,
                amount: Some(amount),
                currency: Some(currency.to_string()),
                recorded_at: Utc::now(),
            },
        );
        true
    }

    /// Compensating step: remove an optimistic entry after the server
    /// disagreed with the gateway's success callback.
    ///
    /// Server-confirmed entries are never removed this way. Returns whether
    /// an entry was removed.
    pub fn revert_optimistic(&self, item_type: ItemType, item_id: &str) -> bool {
        let mut entries = self.entries.write();
        let key = (item_type, item_id.to_string());
        match entries.get(&key) {
            Some(entry) if entry.provenance == Provenance::Optimistic => {
                entries.remove(&key);
                true
            }
            _ => false,
        }
    }

    /// Snapshot of all entries, in no particular order.
    pub fn entries(&self) -> Vec<LedgerEntry> {
        self.entries.read().values().cloned().collect()
    }

    /// Drop everything (sign-out).
    pub fn clear(&self) {
        self.entries.write().clear();
    }
}

fn confirmed(item_type: ItemType, item_id: &str, at: DateTime<Utc>) -> LedgerEntry {
    LedgerEntry {
        item_type,
        item_id: item_id.to_string(),
        provenance: Provenance::ServerConfirmed,
        amount: None,
        currency: None,
        recorded_at: at,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core_catalog::types::PurchaseRecord;

    fn profile() -> UserProfile {
        UserProfile {
            id: "u1".to_string(),
            display_name: "Ada".to_string(),
            roles: Vec::new(),
            purchased_songs: vec!["song-1".to_string()],
            purchased_albums: vec!["album-2".to_string()],
            purchase_history: vec![PurchaseRecord {
                item_type: ItemType::ArtistSubscription,
                item_id: "artist-x".to_string(),
                amount: Some(10.0),
                currency: Some("USD".to_string()),
                purchased_at: None,
            }],
        }
    }

    #[test]
    fn hydration_covers_all_profile_sources() {
        let ledger = PurchaseLedger::new();
        ledger.hydrate_from_profile(&profile());

        assert!(ledger.owns(ItemType::Song, "song-1"));
        assert!(ledger.owns(ItemType::Album, "album-2"));
        assert!(ledger.has_artist_subscription("artist-x"));
        assert!(!ledger.owns(ItemType::Song, "song-2"));
    }

    #[test]
    fn optimistic_record_is_exactly_once() {
        let ledger = PurchaseLedger::new();
        assert!(ledger.record_optimistic(ItemType::Song, "song-9", 5.0, "USD"));
        assert!(!ledger.record_optimistic(ItemType::Song, "song-9", 5.0, "USD"));
        assert_eq!(ledger.entries().len(), 1);
    }

    #[test]
    fn revert_removes_only_optimistic_entries() {
        let ledger = PurchaseLedger::new();
        ledger.hydrate_from_profile(&profile());
        ledger.record_optimistic(ItemType::Song, "song-9", 5.0, "USD");

        assert!(ledger.revert_optimistic(ItemType::Song, "song-9"));
        assert!(!ledger.owns(ItemType::Song, "song-9"));

        // A confirmed entry stays put.
        assert!(!ledger.revert_optimistic(ItemType::Song, "song-1"));
        assert!(ledger.owns(ItemType::Song, "song-1"));
    }

    #[test]
    fn rehydration_replaces_optimistic_state_with_server_truth() {
        let ledger = PurchaseLedger::new();
        ledger.record_optimistic(ItemType::Song, "song-9", 5.0, "USD");
        ledger.hydrate_from_profile(&profile());
        assert!(!ledger.owns(ItemType::Song, "song-9"));
    }

    #[test]
    fn clear_empties_the_ledger() {
        let ledger = PurchaseLedger::new();
        ledger.hydrate_from_profile(&profile());
        ledger.clear();
        assert!(ledger.entries().is_empty());
    }
}
