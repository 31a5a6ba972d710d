//! Facade error types.

use thiserror::Error;

/// Errors surfaced by the outward client API.
///
/// Playback and purchase remain independent failure domains; this enum only
/// aggregates them for the host, it never converts one into the other.
#[derive(Error, Debug)]
pub enum ServiceError {
    /// Startup/configuration failure.
    #[error(transparent)]
    Runtime(#[from] core_runtime::Error),

    /// Catalog/Entitlement API failure.
    #[error(transparent)]
    Catalog(#[from] core_catalog::CatalogError),

    /// Playback-side failure.
    #[error(transparent)]
    Playback(#[from] core_playback::PlaybackError),

    /// Purchase-side failure.
    #[error(transparent)]
    Purchase(#[from] core_entitlement::PurchaseError),

    /// The operation needs a signed-in user profile.
    #[error("No user is signed in")]
    NotSignedIn,

    /// The user already owns the item they asked to buy.
    #[error("Item already owned: {0}")]
    AlreadyOwned(String),
}

/// Result type for facade operations.
pub type Result<T> = std::result::Result<T, ServiceError>;
