//! # Entitlement Resolver
//!
//! Pure, stateless decision table answering one question: may this user play
//! this item, and if not, what stands in the way. First match wins; the
//! rules are ordered so ownership and privileged roles short-circuit before
//! any access-type reasoning.
//!
//! Rule 6 marks `SubscriptionRequired` as a *prerequisite* rather than a
//! final block: a purchase-only item with a price cannot be bought until the
//! user subscribes to its artist, so the purchase flow must run the
//! subscription sub-flow first.

use serde::{Deserialize, Serialize};

use core_catalog::types::{AccessType, Album, ItemType, Track};

use crate::ledger::PurchaseLedger;

/// The computed right of a user to play (or be asked to buy) an item.
///
/// Derived on every ask, never stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "decision", rename_all = "kebab-case")]
pub enum EntitlementDecision {
    /// Playable by this user without further action.
    Free,
    /// An artist subscription is needed. When `purchase_prerequisite` is
    /// set, the subscription is a stepping stone toward buying a
    /// purchase-only item, not the final requirement itself.
    SubscriptionRequired { purchase_prerequisite: bool },
    /// Covered by an active artist subscription.
    Subscribed,
    /// Must be bought individually; the user already holds the artist
    /// subscription that gates the purchase.
    PurchaseRequired,
    /// Already owned.
    Purchased,
}

impl EntitlementDecision {
    /// Whether the item is playable right now.
    pub fn allows_playback(&self) -> bool {
        matches!(
            self,
            EntitlementDecision::Free
                | EntitlementDecision::Subscribed
                | EntitlementDecision::Purchased
        )
    }
}

/// The access-relevant slice of a catalog item.
#[derive(Debug, Clone, PartialEq)]
pub struct ItemAccess {
    pub item_type: ItemType,
    pub item_id: String,
    pub artist_id: String,
    pub access_type: AccessType,
    /// Base-price amount; zero marks an album-bundled item.
    pub base_amount: f64,
}

impl ItemAccess {
    pub fn for_track(track: &Track) -> Self {
        Self {
            item_type: ItemType::Song,
            item_id: track.id.clone(),
            artist_id: track.artist_id.clone(),
            access_type: track.access_type,
            base_amount: track.base_price.amount,
        }
    }

    pub fn for_album(album: &Album) -> Self {
        Self {
            item_type: ItemType::Album,
            item_id: album.id.clone(),
            artist_id: album.artist_id.clone(),
            access_type: album.access_type,
            base_amount: album.base_price.amount,
        }
    }
}

/// Apply the decision table. First match wins.
pub fn decide(
    ledger: &PurchaseLedger,
    unrestricted: bool,
    item: &ItemAccess,
) -> EntitlementDecision {
    // 1. Already owned (by type).
    if ledger.owns(item.item_type, &item.item_id) {
        return EntitlementDecision::Purchased;
    }
    // 2. Privileged role.
    if unrestricted {
        return EntitlementDecision::Free;
    }

    let subscribed = ledger.has_artist_subscription(&item.artist_id);
    match item.access_type {
        // 3 & 4.
        AccessType::Subscription => {
            if subscribed {
                EntitlementDecision::Subscribed
            } else {
                EntitlementDecision::SubscriptionRequired {
                    purchase_prerequisite: false,
                }
            }
        }
        AccessType::PurchaseOnly => {
            // 5. Zero price marks an album-bundled item.
            if item.base_amount == 0.0 {
                EntitlementDecision::Free
            } else if !subscribed {
                // 6. Prerequisite, not a final block.
                EntitlementDecision::SubscriptionRequired {
                    purchase_prerequisite: true,
                }
            } else {
                // 7.
                EntitlementDecision::PurchaseRequired
            }
        }
        // 8. Default.
        AccessType::Free => EntitlementDecision::Free,
    }
}
