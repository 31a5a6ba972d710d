//! Wire-facing catalog types.
//!
//! Field names mirror the API's camelCase JSON. Prices arrive pre-converted
//! per currency; the client never performs currency arithmetic beyond
//! passing amounts through.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// How a track may be accessed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AccessType {
    /// Playable by anyone.
    Free,
    /// Requires an active subscription to the track's artist.
    Subscription,
    /// Must be bought individually (artist subscription is a prerequisite).
    PurchaseOnly,
}

/// One price quote in one currency.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Price {
    /// Uppercase ISO-4217 code.
    pub currency: String,
    /// Amount in that currency, pre-converted server-side.
    pub amount: f64,
}

/// A streamable, possibly purchasable song.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Track {
    pub id: String,
    pub title: String,
    pub artist_id: String,
    #[serde(default)]
    pub album_id: Option<String>,
    /// Declared duration; the sink's reported duration wins once known.
    pub duration_seconds: f64,
    /// Adaptive-streaming manifest URL.
    pub streaming_manifest_url: String,
    pub access_type: AccessType,
    pub base_price: Price,
    #[serde(default)]
    pub converted_prices: Vec<Price>,
}

impl Track {
    /// All currency quotes for this track: the base price followed by the
    /// converted ones, deduplicated by currency (first quote wins).
    pub fn price_options(&self) -> Vec<Price> {
        let mut options = vec![self.base_price.clone()];
        for price in &self.converted_prices {
            if !options.iter().any(|p| p.currency == price.currency) {
                options.push(price.clone());
            }
        }
        options
    }
}

/// An album grouping tracks by one artist.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Album {
    pub id: String,
    pub title: String,
    pub artist_id: String,
    /// Ordered track ids, the album's natural play order.
    pub track_ids: Vec<String>,
    pub access_type: AccessType,
    pub base_price: Price,
    #[serde(default)]
    pub converted_prices: Vec<Price>,
}

/// An artist in the catalog.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Artist {
    pub id: String,
    pub name: String,
    /// Subscription price for this artist's catalog, when offered.
    #[serde(default)]
    pub subscription_price: Option<Price>,
    #[serde(default)]
    pub converted_subscription_prices: Vec<Price>,
}

/// Purchasable item categories in the purchase ledger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ItemType {
    Song,
    Album,
    ArtistSubscription,
}

impl ItemType {
    /// The wire name used in ledger entries and intent requests.
    pub fn as_str(&self) -> &'static str {
        match self {
            ItemType::Song => "song",
            ItemType::Album => "album",
            ItemType::ArtistSubscription => "artist-subscription",
        }
    }
}

impl fmt::Display for ItemType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One completed purchase in the user's server-side ledger.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PurchaseRecord {
    pub item_type: ItemType,
    pub item_id: String,
    #[serde(default)]
    pub amount: Option<f64>,
    #[serde(default)]
    pub currency: Option<String>,
    #[serde(default)]
    pub purchased_at: Option<DateTime<Utc>>,
}

/// Roles granted to a user account.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UserRole {
    /// Unrestricted access; every item resolves as free to play.
    Admin,
    /// Ordinary listener.
    Listener,
}

/// The signed-in user's profile with purchase state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    pub id: String,
    pub display_name: String,
    #[serde(default)]
    pub roles: Vec<UserRole>,
    #[serde(default)]
    pub purchased_songs: Vec<String>,
    #[serde(default)]
    pub purchased_albums: Vec<String>,
    #[serde(default)]
    pub purchase_history: Vec<PurchaseRecord>,
}

impl UserProfile {
    /// Whether this user holds an unrestricted role.
    pub fn is_unrestricted(&self) -> bool {
        self.roles.contains(&UserRole::Admin)
    }
}

/// Server-issued authorization record for one gateway transaction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutIntent {
    /// Server-assigned intent identifier.
    pub id: String,
    /// Authorized amount.
    pub amount: f64,
    /// Currency of the authorized amount.
    pub currency: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn track_with_prices() -> Track {
        Track {
            id: "song-1".to_string(),
            title: "First Light".to_string(),
            artist_id: "artist-1".to_string(),
            album_id: None,
            duration_seconds: 241.0,
            streaming_manifest_url: "https://cdn.example.com/song-1/master.m3u8".to_string(),
            access_type: AccessType::PurchaseOnly,
            base_price: Price {
                currency: "USD".to_string(),
                amount: 5.0,
            },
            converted_prices: vec![
                Price {
                    currency: "EUR".to_string(),
                    amount: 4.5,
                },
                Price {
                    currency: "INR".to_string(),
                    amount: 400.0,
                },
            ],
        }
    }

    #[test]
    fn price_options_include_base_first() {
        let options = track_with_prices().price_options();
        assert_eq!(options.len(), 3);
        assert_eq!(options[0].currency, "USD");
        assert_eq!(options[2].amount, 400.0);
    }

    #[test]
    fn price_options_dedup_by_currency() {
        let mut track = track_with_prices();
        track.converted_prices.push(Price {
            currency: "USD".to_string(),
            amount: 99.0,
        });

        let options = track.price_options();
        assert_eq!(options.iter().filter(|p| p.currency == "USD").count(), 1);
        assert_eq!(options[0].amount, 5.0);
    }

    #[test]
    fn access_type_wire_names() {
        let json = serde_json::to_string(&AccessType::PurchaseOnly).unwrap();
        assert_eq!(json, "\"purchase-only\"");

        let parsed: AccessType = serde_json::from_str("\"subscription\"").unwrap();
        assert_eq!(parsed, AccessType::Subscription);
    }

    #[test]
    fn profile_defaults_tolerate_sparse_json() {
        let profile: UserProfile =
            serde_json::from_str(r#"{"id":"u1","displayName":"Ada"}"#).unwrap();
        assert!(profile.roles.is_empty());
        assert!(profile.purchase_history.is_empty());
        assert!(!profile.is_unrestricted());
    }

    #[test]
    fn item_type_roundtrip() {
        let json = serde_json::to_string(&ItemType::ArtistSubscription).unwrap();
        assert_eq!(json, "\"artist-subscription\"");
        assert_eq!(ItemType::ArtistSubscription.as_str(), "artist-subscription");
    }
}
